//! Durable storage lives in a single SQLite file, see [database::EventStore].
//!  - `activity_events` keeps closed intervals, one row per run of identical activity.
//!  - `project_mappings` keeps user rules assigning processes/titles to projects.
//!  - Timestamps are UTC text, so range filters are plain string comparisons.

pub mod database;
pub mod entities;
pub mod events;
pub mod mappings;
pub mod schema;

pub use database::EventStore;
