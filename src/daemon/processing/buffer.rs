use std::{future::Future, ops::Deref};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::daemon::storage::entities::ActivityEvent;

/// Destination of flushed events. Every call is one batched, all-or-nothing write.
pub trait EventSink {
    fn write_events(
        &self,
        events: Vec<ActivityEvent>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref + Sync> EventSink for T
where
    T::Target: EventSink,
{
    fn write_events(
        &self,
        events: Vec<ActivityEvent>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().write_events(events)
    }
}

/// Closed events waiting to be written, plus the moment of the last successful write.
pub struct FlushBuffer {
    pending: Vec<ActivityEvent>,
    last_flush: DateTime<Utc>,
    flush_interval: chrono::Duration,
}

impl FlushBuffer {
    pub fn new(flush_interval: std::time::Duration, now: DateTime<Utc>) -> Self {
        Self {
            pending: Vec::new(),
            last_flush: now,
            flush_interval: chrono::Duration::from_std(flush_interval)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn push(&mut self, event: ActivityEvent) {
        self.pending.push(event);
    }

    pub fn pending(&self) -> &[ActivityEvent] {
        &self.pending
    }

    pub fn last_flush(&self) -> DateTime<Utc> {
        self.last_flush
    }

    pub fn should_flush(&self, now: DateTime<Utc>) -> bool {
        !self.pending.is_empty() && now - self.last_flush >= self.flush_interval
    }

    /// Writes everything pending in one batch. On failure the events stay buffered for the next
    /// attempt. Returns the number of written events.
    pub async fn flush(&mut self, sink: &impl EventSink, now: DateTime<Utc>) -> Result<usize> {
        if self.pending.is_empty() {
            debug!("Nothing to flush");
            return Ok(0);
        }

        let count = self.pending.len();
        sink.write_events(self.pending.clone()).await?;
        self.pending.clear();
        self.last_flush = now;
        info!("Flushed {count} events");
        Ok(count)
    }
}
