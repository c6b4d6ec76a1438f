use std::{fmt::Write, path::PathBuf};

use ansi_term::Style;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser};

use crate::{
    analysis::{
        aggregate::{summarize_buckets, ActivitySummary},
        projects::ProjectLookup,
    },
    daemon::storage::EventStore,
    utils::time::{format_day, parse_day, today, TimeRange},
};

use super::Args;

const TOP_ENTRIES: usize = 5;
const UNTITLED: &str = "(untitled)";

#[derive(Debug, Parser)]
pub struct SummaryCommand {
    #[arg(long, help = "Day to summarize as YYYY-MM-DD. Defaults to today")]
    date: Option<String>,
    #[arg(long, help = "Database file. Defaults to activity.sqlite3 in the state directory")]
    db: Option<PathBuf>,
}

impl SummaryCommand {
    pub fn db(&self) -> Option<&PathBuf> {
        self.db.as_ref()
    }
}

pub async fn process_summary_command(command: SummaryCommand, db_path: PathBuf) -> Result<()> {
    let day = match command.date.as_deref().map(parse_day) {
        Some(Ok(day)) => day,
        Some(Err(e)) => {
            return Err(Args::command()
                .error(clap::error::ErrorKind::ValueValidation, e.to_string())
                .into());
        }
        None => today(),
    };

    let store = EventStore::open(db_path)?;
    let rows = store
        .fetch_bucket_totals(TimeRange::local_days(day, day))
        .await?;
    let mappings = store.fetch_project_mappings().await?;
    let summary = summarize_buckets(rows, &ProjectLookup::from_mappings(&mappings));

    print!("{}", render_summary(day, &summary));
    Ok(())
}

fn render_summary(day: NaiveDate, summary: &ActivitySummary) -> String {
    if summary.is_empty() {
        return "No activity recorded for the selected day.\n".to_string();
    }

    let heading = Style::new().bold();
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = writeln!(out, "{}", heading.paint(format!("Summary for {}", format_day(day))));
    let _ = writeln!(out, "{}", "-".repeat(40));
    let _ = writeln!(out, "Active time: {}", format_duration(summary.active_seconds));
    let _ = writeln!(out, "Idle time:   {}", format_duration(summary.idle_seconds));

    if !summary.per_process.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", heading.paint("Top activities:"));
        for entry in summary.per_process.iter().take(TOP_ENTRIES) {
            let _ = writeln!(
                out,
                "  {:<30} {}",
                entry.process_name,
                format_duration(entry.seconds)
            );
        }
    }

    if !summary.per_window.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", heading.paint("Top windows / tabs:"));
        for entry in summary.per_window.iter().take(TOP_ENTRIES) {
            let title = entry.window_title.as_deref().unwrap_or(UNTITLED);
            let title = title.chars().take(45).collect::<String>();
            let _ = writeln!(
                out,
                "  {:<12} {:<45} {}",
                entry.process_name,
                title,
                format_duration(entry.seconds)
            );
        }
    }

    if !summary.per_project.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", heading.paint("Projects:"));
        for entry in summary.per_project.iter().take(TOP_ENTRIES) {
            let _ = writeln!(
                out,
                "  {:<30} {}",
                entry.project_name,
                format_duration(entry.seconds)
            );
        }
    }
    out
}

/// `HH:MM:SS`, hours aren't wrapped at 24.
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}
