use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::CollectorSettings,
    daemon::processing::buffer::{EventSink, FlushBuffer},
    utils::clock::Clock,
};

use super::{probe::ActivityProbe, segmenter::Segmenter};

/// Sampling loop. Owns the segmenter and the flush buffer exclusively, nothing else ever sees
/// the open event.
pub struct ActivityCollector<S> {
    probe: ActivityProbe,
    segmenter: Segmenter,
    buffer: FlushBuffer,
    sink: S,
    clock: Arc<dyn Clock>,
    sample_interval: Duration,
    shutdown: CancellationToken,
}

impl<S: EventSink> ActivityCollector<S> {
    pub fn new(
        probe: ActivityProbe,
        sink: S,
        settings: &CollectorSettings,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        let buffer = FlushBuffer::new(settings.flush_interval, clock.time());
        Self {
            probe,
            segmenter: Segmenter::new(),
            buffer,
            sink,
            clock,
            sample_interval: settings.sample_interval,
            shutdown,
        }
    }

    fn sample(&mut self) {
        let now = self.clock.time();
        match self.probe.sample() {
            Ok(observation) => {
                debug!("Sampled {:?}", observation);
                if let Some(closed) = self.segmenter.observe(
                    now,
                    observation.process_name.as_deref(),
                    observation.window_title.as_deref(),
                    observation.is_idle,
                ) {
                    self.buffer.push(closed);
                }
            }
            Err(e) => warn!("Skipping sample: {e}"),
        }
    }

    async fn flush_if_needed(&mut self) {
        let now = self.clock.time();
        if !self.buffer.should_flush(now) {
            return;
        }
        if let Err(e) = self.buffer.flush(&self.sink, now).await {
            error!("Failed to flush events, keeping them for the next attempt {e:?}");
        }
    }

    /// Persists buffered events. A forced flush first closes the open event at the current time.
    pub async fn flush(&mut self, force: bool) -> Result<usize> {
        let now = self.clock.time();
        if force {
            if let Some(closed) = self.segmenter.close(now) {
                self.buffer.push(closed);
            }
        }
        self.buffer.flush(&self.sink, now).await
    }

    /// Executes the collector event loop until the shutdown token is cancelled.
    pub async fn run(mut self) -> Result<()> {
        info!("Collector started");
        let mut next_sample = self.clock.instant();
        loop {
            self.sample();
            self.flush_if_needed().await;

            // After a suspend the schedule is far behind, don't try to catch up in a burst.
            next_sample = (next_sample + self.sample_interval).max(self.clock.instant());

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.clock.sleep_until(next_sample) => (),
            }
        }

        info!("Collector stopping, flushing remaining events");
        self.flush(true)
            .await
            .inspect_err(|e| error!("Final flush failed {e:?}"))?;
        Ok(())
    }
}
