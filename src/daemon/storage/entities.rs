use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A contiguous block of time spent in a single activity. Intervals are stored instead of raw
/// samples, one interval per run of identical state, so storage grows with activity changes and
/// not with sampling frequency.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityEvent {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub is_idle: bool,
}

impl ActivityEvent {
    pub fn starting_at(
        timestamp: DateTime<Utc>,
        process_name: Option<String>,
        window_title: Option<String>,
        is_idle: bool,
    ) -> Self {
        Self {
            start_time: timestamp,
            end_time: timestamp,
            process_name,
            window_title,
            is_idle,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Whole seconds, truncating each bound the same way the grouped SQL query does.
    pub fn whole_seconds(&self) -> i64 {
        self.end_time.timestamp() - self.start_time.timestamp()
    }

    pub fn has_state(
        &self,
        process_name: Option<&str>,
        window_title: Option<&str>,
        is_idle: bool,
    ) -> bool {
        self.is_idle == is_idle
            && self.process_name.as_deref() == process_name
            && self.window_title.as_deref() == window_title
    }
}

/// An event that went through the store and got an id.
#[derive(PartialEq, Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub event: ActivityEvent,
}

impl Serialize for StoredEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Payload<'a> {
            id: i64,
            start_time: DateTime<Utc>,
            end_time: DateTime<Utc>,
            process_name: Option<&'a str>,
            window_title: Option<&'a str>,
            is_idle: bool,
            duration_seconds: f64,
        }

        Payload {
            id: self.id,
            start_time: self.event.start_time,
            end_time: self.event.end_time,
            process_name: self.event.process_name.as_deref(),
            window_title: self.event.window_title.as_deref(),
            is_idle: self.event.is_idle,
            duration_seconds: self.event.duration().num_milliseconds() as f64 / 1000.,
        }
        .serialize(serializer)
    }
}

/// Row of the grouped duration query. Seconds are summed per `(process, title, idle)` triple.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct BucketRow {
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub is_idle: bool,
    pub seconds: i64,
}

/// A user rule assigning a process and/or a window title to a project.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct ProjectMapping {
    pub id: i64,
    pub project_name: String,
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Already validated and normalized mapping waiting to be upserted.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NewProjectMapping {
    pub project_name: String,
    pub process_key: Option<String>,
    pub title_key: Option<String>,
}

/// Explicit presence marker for partial updates. A missing JSON field is [FieldUpdate::Keep], any
/// present value (including `null` for nullable fields) is [FieldUpdate::Set].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn apply(self, current: &mut T) {
        if let FieldUpdate::Set(value) = self {
            *current = value;
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<FieldUpdate<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(FieldUpdate::Set)
}

/// Partial update of a stored event. Only fields that are [FieldUpdate::Set] change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventPatch {
    #[serde(default, deserialize_with = "present")]
    pub start_time: FieldUpdate<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub end_time: FieldUpdate<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub process_name: FieldUpdate<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub window_title: FieldUpdate<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub is_idle: FieldUpdate<bool>,
}

impl EventPatch {
    /// Whether the patch changes where the event starts or ends.
    pub fn moves_bounds(&self) -> bool {
        !self.start_time.is_keep() || !self.end_time.is_keep()
    }

    /// Returns the event as it would look after the patch, without touching `event`.
    pub fn applied_to(&self, event: &ActivityEvent) -> ActivityEvent {
        let mut updated = event.clone();
        self.start_time.clone().apply(&mut updated.start_time);
        self.end_time.clone().apply(&mut updated.end_time);
        self.process_name.clone().apply(&mut updated.process_name);
        self.window_title.clone().apply(&mut updated.window_title);
        self.is_idle.clone().apply(&mut updated.is_idle);
        updated
    }
}
