use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::{
    daemon::processing::buffer::EventSink,
    error::TrackerError,
    utils::time::{format_store_time, parse_store_time, TimeRange},
};

use super::{
    database::EventStore,
    entities::{ActivityEvent, BucketRow, EventPatch, StoredEvent},
};

fn row_to_event(row: &Row) -> Result<StoredEvent> {
    Ok(StoredEvent {
        id: row.get("id")?,
        event: ActivityEvent {
            start_time: parse_store_time(&row.get::<_, String>("start_time")?)?,
            end_time: parse_store_time(&row.get::<_, String>("end_time")?)?,
            process_name: row.get("process_name")?,
            window_title: row.get("window_title")?,
            is_idle: row.get("is_idle")?,
        },
    })
}

fn load_event(tx: &Transaction, id: i64) -> Result<Option<StoredEvent>> {
    let mut stmt = tx.prepare_cached(
        "SELECT id, start_time, end_time, process_name, window_title, is_idle
         FROM activity_events
         WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![id])?;
    rows.next()?.map(row_to_event).transpose()
}

fn apply_patch(
    tx: &Transaction,
    id: i64,
    patch: &EventPatch,
) -> std::result::Result<StoredEvent, TrackerError> {
    let stored = load_event(tx, id)?.ok_or_else(|| TrackerError::not_found(format!("event {id}")))?;
    let updated = patch.applied_to(&stored.event);
    if patch.moves_bounds() && updated.end_time <= updated.start_time {
        return Err(TrackerError::validation("end_time must be after start_time"));
    }

    tx.execute(
        "UPDATE activity_events
         SET start_time = ?1,
             end_time = ?2,
             process_name = ?3,
             window_title = ?4,
             is_idle = ?5
         WHERE id = ?6",
        params![
            format_store_time(updated.start_time),
            format_store_time(updated.end_time),
            updated.process_name,
            updated.window_title,
            updated.is_idle,
            id,
        ],
    )
    .context("failed to update event")?;

    Ok(StoredEvent { id, event: updated })
}

impl EventStore {
    /// Appends `events` in a single transaction. Either all of them land or none do.
    pub async fn insert_events(&self, events: Vec<ActivityEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO activity_events (
                        start_time,
                        end_time,
                        process_name,
                        window_title,
                        is_idle
                    ) VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for event in &events {
                    stmt.execute(params![
                        format_store_time(event.start_time),
                        format_store_time(event.end_time),
                        event.process_name,
                        event.window_title,
                        event.is_idle,
                    ])
                    .context("failed to insert event")?;
                }
            }
            tx.commit()?;
            debug!("Inserted {} events", events.len());
            Ok(())
        })
        .await
    }

    /// Whole seconds per `(process, title, idle)` for events starting inside `range`, largest
    /// first.
    pub async fn fetch_bucket_totals(&self, range: TimeRange) -> Result<Vec<BucketRow>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT
                    process_name,
                    window_title,
                    is_idle,
                    CAST(SUM(strftime('%s', end_time) - strftime('%s', start_time)) AS INTEGER)
                        AS seconds
                 FROM activity_events
                 WHERE start_time >= ?1 AND start_time < ?2
                 GROUP BY process_name, window_title, is_idle
                 ORDER BY seconds DESC, MIN(id)",
            )?;
            let rows = stmt
                .query_map(
                    params![format_store_time(range.start), format_store_time(range.end)],
                    |row| {
                        Ok(BucketRow {
                            process_name: row.get(0)?,
                            window_title: row.get(1)?,
                            is_idle: row.get(2)?,
                            seconds: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                        })
                    },
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Individual events starting inside `range`, ordered by start.
    pub async fn fetch_events(&self, range: TimeRange) -> Result<Vec<StoredEvent>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, start_time, end_time, process_name, window_title, is_idle
                 FROM activity_events
                 WHERE start_time >= ?1 AND start_time < ?2
                 ORDER BY start_time, id",
            )?;
            let mut rows =
                stmt.query(params![format_store_time(range.start), format_store_time(range.end)])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }
            Ok(events)
        })
        .await
    }

    pub async fn fetch_event(&self, id: i64) -> Result<Option<StoredEvent>> {
        self.execute(move |conn| {
            conn.query_row(
                "SELECT id, start_time, end_time, process_name, window_title, is_idle
                 FROM activity_events
                 WHERE id = ?1",
                params![id],
                |row| Ok(row_to_event(row)),
            )
            .optional()?
            .transpose()
        })
        .await
    }

    /// Applies `patch` to event `id` atomically. The resulting interval must have
    /// `end_time > start_time`, bounds missing from the patch are taken from the stored row.
    pub async fn update_event(
        &self,
        id: i64,
        patch: EventPatch,
    ) -> crate::error::Result<StoredEvent> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let outcome = apply_patch(&tx, id, &patch);
            if outcome.is_ok() {
                tx.commit()?;
            }
            Ok(outcome)
        })
        .await?
    }
}

impl EventSink for EventStore {
    async fn write_events(&self, events: Vec<ActivityEvent>) -> Result<()> {
        self.insert_events(events).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use crate::{
        daemon::storage::{
            database::EventStore,
            entities::{ActivityEvent, EventPatch},
        },
        error::TrackerError,
        utils::time::TimeRange,
    };

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 5, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn event(start: i64, end: i64, process: &str, title: &str, is_idle: bool) -> ActivityEvent {
        ActivityEvent {
            start_time: at(start),
            end_time: at(end),
            process_name: (!is_idle).then(|| process.to_string()),
            window_title: (!is_idle).then(|| title.to_string()),
            is_idle,
        }
    }

    fn day() -> TimeRange {
        let date = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        TimeRange::days_in(&Utc, date, date)
    }

    fn open_store() -> Result<(TempDir, EventStore)> {
        let dir = tempdir()?;
        let store = EventStore::open(dir.path().join("activity.sqlite3"))?;
        Ok((dir, store))
    }

    #[tokio::test]
    async fn events_round_trip_in_start_order() -> Result<()> {
        let (_dir, store) = open_store()?;
        let later = event(60, 90, "chrome.exe", "Docs", false);
        let mut earlier = event(0, 60, "code.exe", "main.rs", false);
        earlier.start_time += Duration::microseconds(250);

        store.insert_events(vec![later.clone(), earlier.clone()]).await?;

        let events = store.fetch_events(day()).await?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, earlier);
        assert_eq!(events[1].event, later);
        Ok(())
    }

    #[tokio::test]
    async fn range_is_half_open_on_start_time() -> Result<()> {
        let (_dir, store) = open_store()?;
        let previous_day = ActivityEvent {
            start_time: at(-60),
            end_time: at(30),
            ..event(0, 0, "code.exe", "main.rs", false)
        };
        let next_day = ActivityEvent {
            start_time: day().end,
            end_time: day().end + Duration::minutes(1),
            ..event(0, 0, "code.exe", "main.rs", false)
        };
        store
            .insert_events(vec![previous_day, event(30, 40, "a", "b", false), next_day])
            .await?;

        let events = store.fetch_events(day()).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.start_time, at(30));
        Ok(())
    }

    #[tokio::test]
    async fn bucket_totals_group_and_sort() -> Result<()> {
        let (_dir, store) = open_store()?;
        store
            .insert_events(vec![
                event(0, 60, "code.exe", "main.rs", false),
                event(60, 100, "chrome.exe", "Docs", false),
                event(100, 160, "code.exe", "main.rs", false),
                event(160, 460, "", "", true),
            ])
            .await?;

        let rows = store.fetch_bucket_totals(day()).await?;
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_idle);
        assert_eq!(rows[0].seconds, 300);
        assert_eq!(rows[0].process_name, None);
        assert_eq!(rows[1].process_name.as_deref(), Some("code.exe"));
        assert_eq!(rows[1].seconds, 120);
        assert_eq!(rows[2].seconds, 40);
        Ok(())
    }

    #[tokio::test]
    async fn update_uses_stored_bound_for_validation() -> Result<()> {
        let (_dir, store) = open_store()?;
        store
            .insert_events(vec![event(0, 60, "code.exe", "main.rs", false)])
            .await?;
        let id = store.fetch_events(day()).await?[0].id;

        let patch: EventPatch =
            serde_json::from_value(serde_json::json!({ "start_time": at(60), "window_title": "x" }))?;
        let err = store.update_event(id, patch).await.unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));

        // Nothing from the rejected patch may leak into the row.
        let stored = store.fetch_event(id).await?.unwrap();
        assert_eq!(stored.event, event(0, 60, "code.exe", "main.rs", false));
        Ok(())
    }

    #[tokio::test]
    async fn update_applies_supplied_fields_only() -> Result<()> {
        let (_dir, store) = open_store()?;
        store
            .insert_events(vec![event(0, 60, "code.exe", "main.rs", false)])
            .await?;
        let id = store.fetch_events(day()).await?[0].id;

        let patch: EventPatch = serde_json::from_value(
            serde_json::json!({ "end_time": at(120), "window_title": null }),
        )?;
        let updated = store.update_event(id, patch).await?;
        assert_eq!(updated.event.end_time, at(120));
        assert_eq!(updated.event.window_title, None);
        assert_eq!(updated.event.process_name.as_deref(), Some("code.exe"));
        assert_eq!(store.fetch_event(id).await?.unwrap(), updated);
        Ok(())
    }

    #[tokio::test]
    async fn zero_length_event_can_be_retitled() -> Result<()> {
        let (_dir, store) = open_store()?;
        store
            .insert_events(vec![ActivityEvent::starting_at(
                at(0),
                Some("code.exe".into()),
                Some("main.rs".into()),
                false,
            )])
            .await?;
        let id = store.fetch_events(day()).await?[0].id;

        let patch: EventPatch =
            serde_json::from_value(serde_json::json!({ "window_title": "lib.rs" }))?;
        let updated = store.update_event(id, patch).await?;
        assert_eq!(updated.event.window_title.as_deref(), Some("lib.rs"));
        assert_eq!(updated.event.start_time, updated.event.end_time);

        // Touching a bound still requires a positive length.
        let patch: EventPatch = serde_json::from_value(serde_json::json!({ "end_time": at(0) }))?;
        assert!(matches!(
            store.update_event(id, patch).await,
            Err(TrackerError::Validation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn update_of_missing_event_is_not_found() -> Result<()> {
        let (_dir, store) = open_store()?;
        let err = store
            .update_event(42, EventPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(_)));
        Ok(())
    }
}
