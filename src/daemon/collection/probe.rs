use tracing::{instrument, warn};

use crate::{error::ProbeFailure, window_api::WindowManager};

use super::idle::IdleEvaluator;

/// What the user was doing at one sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Observation {
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub is_idle: bool,
}

/// Turns the raw platform readings into an [Observation].
pub struct ActivityProbe {
    manager: Box<dyn WindowManager>,
    idle: IdleEvaluator,
}

impl ActivityProbe {
    pub fn new(manager: Box<dyn WindowManager>, idle: IdleEvaluator) -> Self {
        Self { manager, idle }
    }

    #[instrument(skip(self))]
    pub fn sample(&mut self) -> Result<Observation, ProbeFailure> {
        let is_idle = match self.manager.get_idle_time() {
            Ok(idle_time) => self.idle.is_idle(idle_time),
            Err(e) => {
                warn!("Couldn't read idle time, assuming the user is active: {e:?}");
                false
            }
        };

        if is_idle {
            return Ok(Observation {
                is_idle,
                ..Default::default()
            });
        }

        let window = self.manager.get_active_window_data().map_err(ProbeFailure)?;
        Ok(window
            .map(|data| Observation {
                process_name: data.process_name,
                window_title: data.window_title,
                is_idle,
            })
            .unwrap_or_default())
    }
}
