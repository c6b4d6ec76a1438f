use std::collections::HashMap;

use serde::Serialize;

use crate::{
    daemon::{
        collection::normalize::normalize_title,
        storage::entities::{ActivityEvent, BucketRow},
    },
    utils::time::TimeRange,
};

use super::projects::ProjectLookup;

pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Seconds spent in one `(process, title, idle)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketEntry {
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub seconds: i64,
    pub is_idle: bool,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessTotal {
    pub process_name: String,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowTotal {
    pub process_name: String,
    pub window_title: Option<String>,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTotal {
    pub project_name: String,
    pub seconds: i64,
}

/// Rollups of a day or date range. Every list is sorted by seconds, largest first, with ties
/// kept in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    pub active_seconds: i64,
    pub idle_seconds: i64,
    pub entries: Vec<BucketEntry>,
    pub idle_entries: Vec<BucketEntry>,
    pub per_process: Vec<ProcessTotal>,
    pub per_window: Vec<WindowTotal>,
    pub per_project: Vec<ProjectTotal>,
}

impl ActivitySummary {
    pub fn overall_seconds(&self) -> i64 {
        self.active_seconds + self.idle_seconds
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.idle_entries.is_empty()
    }
}

/// Sums keyed values while remembering the order keys first showed up in.
struct OrderedTotals<K, V> {
    index: HashMap<K, usize>,
    items: Vec<(V, i64)>,
}

impl<K: std::hash::Hash + Eq, V> OrderedTotals<K, V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn add(&mut self, key: K, value: impl FnOnce() -> V, seconds: i64) {
        match self.index.get(&key) {
            Some(&position) => self.items[position].1 += seconds,
            None => {
                self.index.insert(key, self.items.len());
                self.items.push((value(), seconds));
            }
        }
    }

    fn into_sorted(self) -> Vec<(V, i64)> {
        let mut items = self.items;
        // Stable, so equal totals stay in order of first appearance.
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items
    }
}

/// Aggregates raw events whose start falls into `range`.
pub fn summarize(events: &[ActivityEvent], range: TimeRange, lookup: &ProjectLookup) -> ActivitySummary {
    summarize_buckets(
        events
            .iter()
            .filter(|event| range.contains(event.start_time))
            .map(|event| BucketRow {
                process_name: event.process_name.clone(),
                window_title: event.window_title.clone(),
                is_idle: event.is_idle,
                seconds: event.whole_seconds(),
            }),
        lookup,
    )
}

/// Aggregates pre-grouped rows. Titles are normalized again, so rows that were edited by hand
/// land in the same bucket as recorded ones.
pub fn summarize_buckets(
    rows: impl IntoIterator<Item = BucketRow>,
    lookup: &ProjectLookup,
) -> ActivitySummary {
    let mut buckets = OrderedTotals::new();
    for row in rows {
        let title = normalize_title(row.process_name.as_deref(), row.window_title.as_deref());
        let key = (row.process_name, title, row.is_idle);
        buckets.add(key.clone(), || key, row.seconds);
    }

    let mut summary = ActivitySummary::default();
    let mut processes = OrderedTotals::new();
    let mut windows = OrderedTotals::new();
    let mut projects = OrderedTotals::new();

    // Rollups walk the merged buckets in input order, so ties keep the order keys first showed
    // up in. Only the finished lists get sorted.
    for ((process_name, window_title, is_idle), seconds) in buckets.items {
        if is_idle {
            summary.idle_seconds += seconds;
            summary.idle_entries.push(BucketEntry {
                process_name,
                window_title,
                seconds,
                is_idle,
                project_name: None,
            });
            continue;
        }

        summary.active_seconds += seconds;
        let project_name = lookup
            .resolve(process_name.as_deref(), window_title.as_deref())
            .map(str::to_string);
        if let Some(project) = &project_name {
            projects.add(project.clone(), || project.clone(), seconds);
        }

        let display = process_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_PROCESS.to_string());
        let process_key = process_name.as_deref().map(str::to_lowercase);
        processes.add(process_key.clone(), || display.clone(), seconds);
        windows.add(
            (process_key, window_title.clone()),
            || (display, window_title.clone()),
            seconds,
        );

        summary.entries.push(BucketEntry {
            process_name,
            window_title,
            seconds,
            is_idle,
            project_name,
        });
    }
    summary.entries.sort_by(|a, b| b.seconds.cmp(&a.seconds));
    summary.idle_entries.sort_by(|a, b| b.seconds.cmp(&a.seconds));

    summary.per_process = processes
        .into_sorted()
        .into_iter()
        .map(|(process_name, seconds)| ProcessTotal {
            process_name,
            seconds,
        })
        .collect();
    summary.per_window = windows
        .into_sorted()
        .into_iter()
        .map(|((process_name, window_title), seconds)| WindowTotal {
            process_name,
            window_title,
            seconds,
        })
        .collect();
    summary.per_project = projects
        .into_sorted()
        .into_iter()
        .map(|(project_name, seconds)| ProjectTotal {
            project_name,
            seconds,
        })
        .collect();
    summary
}
