use chrono::{DateTime, Utc};
use tracing::debug;

use crate::daemon::storage::entities::ActivityEvent;

use super::normalize::normalize_title;

/// Folds consecutive samples into intervals. At most one event is open at a time and the next
/// event always starts exactly where the previous one ended.
#[derive(Debug, Default)]
pub struct Segmenter {
    current: Option<ActivityEvent>,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ActivityEvent> {
        self.current.as_ref()
    }

    /// Records a sample taken at `timestamp`. Returns the event that the sample closed, if the
    /// state changed.
    pub fn observe(
        &mut self,
        timestamp: DateTime<Utc>,
        process_name: Option<&str>,
        window_title: Option<&str>,
        is_idle: bool,
    ) -> Option<ActivityEvent> {
        let (process_name, window_title) = if is_idle {
            (None, None)
        } else {
            (
                process_name.map(str::to_string),
                normalize_title(process_name, window_title),
            )
        };

        if let Some(current) = self.current.as_mut() {
            if current.has_state(process_name.as_deref(), window_title.as_deref(), is_idle) {
                current.end_time = current.end_time.max(timestamp);
                return None;
            }
        }

        let closed = self.close(timestamp);
        // A wall clock stepping back must not make the new event overlap the closed one.
        let start = closed.as_ref().map_or(timestamp, |v| v.end_time);
        debug!(
            "Opening event {:?} {:?} idle={is_idle}",
            process_name, window_title
        );
        self.current = Some(ActivityEvent::starting_at(
            start,
            process_name,
            window_title,
            is_idle,
        ));
        closed
    }

    /// Ends the open event at `now` and hands it out. The segmenter is empty afterwards.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<ActivityEvent> {
        let mut closed = self.current.take()?;
        // Never move the end backwards, even if the wall clock did.
        closed.end_time = closed.end_time.max(now);
        Some(closed)
    }
}
