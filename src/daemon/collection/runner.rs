use std::{sync::Mutex, time::Duration};

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{config::AppContext, daemon::storage::EventStore};

use super::{collector::ActivityCollector, probe::ActivityProbe};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a fresh probe for every start, platform handles aren't reused between runs.
pub type ProbeFactory = Box<dyn Fn() -> Result<ActivityProbe> + Send + Sync>;

struct RunningCollector {
    shutdown: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

/// Starts and stops the background collector task.
pub struct CollectorRunner {
    context: AppContext,
    store: EventStore,
    probe_factory: ProbeFactory,
    parent: CancellationToken,
    running: Mutex<Option<RunningCollector>>,
}

impl CollectorRunner {
    /// Cancelling `parent` stops the collector as well.
    pub fn new(
        context: AppContext,
        store: EventStore,
        probe_factory: ProbeFactory,
        parent: CancellationToken,
    ) -> Self {
        Self {
            context,
            store,
            probe_factory,
            parent,
            running: Mutex::new(None),
        }
    }

    /// Spawns the collector unless it already runs. Returns whether a new task was started.
    pub fn start(&self) -> Result<bool> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| anyhow!("collector state is poisoned"))?;
        if running.as_ref().is_some_and(|v| !v.handle.is_finished()) {
            return Ok(false);
        }

        let shutdown = self.parent.child_token();
        let collector = ActivityCollector::new(
            (self.probe_factory)()?,
            self.store.clone(),
            &self.context.settings,
            self.context.clock.clone(),
            shutdown.clone(),
        );
        let handle = tokio::spawn(async move {
            collector
                .run()
                .await
                .inspect_err(|e| error!("Collector exited with an error {e:?}"))
        });
        *running = Some(RunningCollector { shutdown, handle });
        info!("Collector task spawned");
        Ok(true)
    }

    /// Cancels the collector and waits for its final flush, giving up after a bounded time.
    pub async fn stop(&self) -> Result<()> {
        let running = self
            .running
            .lock()
            .map_err(|_| anyhow!("collector state is poisoned"))?
            .take();
        let Some(RunningCollector { shutdown, handle }) = running else {
            return Ok(());
        };

        shutdown.cancel();
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!("Collector didn't stop within {STOP_TIMEOUT:?}");
                Err(anyhow!("collector didn't stop in time"))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.as_ref().is_some_and(|v| !v.handle.is_finished()))
            .unwrap_or(false)
    }
}
