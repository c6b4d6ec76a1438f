//! Local activity tracker. A collector samples the foreground window, folds the samples into
//! contiguous activity events and stores them in SQLite. The CLI and a small JSON API turn those
//! events into daily summaries, per-project totals and hand-corrected timelines.
//!

pub mod analysis;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod server;
pub mod utils;
pub mod window_api;
