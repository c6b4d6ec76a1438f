use std::time::Duration;

/// Decides whether the user stepped away based on the time since their last input.
#[derive(Debug, Clone, Copy)]
pub struct IdleEvaluator {
    threshold: Duration,
}

impl IdleEvaluator {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn is_idle(&self, idle_time: Duration) -> bool {
        idle_time >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::IdleEvaluator;

    #[test]
    fn threshold_is_inclusive() {
        let evaluator = IdleEvaluator::new(Duration::from_secs(60));
        assert!(!evaluator.is_idle(Duration::from_secs(59)));
        assert!(evaluator.is_idle(Duration::from_secs(60)));
        assert!(evaluator.is_idle(Duration::from_secs(3600)));
    }
}
