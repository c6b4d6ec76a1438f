pub mod summary;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use summary::{process_summary_command, SummaryCommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;

use crate::{
    config::{AppContext, CollectorSettings, DEFAULT_IDLE_MINUTES, DEFAULT_SAMPLE_SECONDS},
    daemon::{run_collector, run_web},
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, default_database_path},
        logging::{enable_logging, CLI_PREFIX, COLLECTOR_PREFIX},
    },
};

const DEFAULT_PORT: u16 = 8765;

#[derive(Parser, Debug)]
#[command(name = "Timetrail", version, long_about = None)]
#[command(about = "Records which window you spend time in and summarizes it", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable debug logging in the console")]
    verbose: bool,
}

#[derive(Debug, clap::Args)]
struct CollectorArgs {
    #[arg(
        long,
        help = "Database file. Defaults to activity.sqlite3 in $XDG_STATE_HOME/timetrail or $HOME/.local/state/timetrail"
    )]
    db: Option<PathBuf>,
    #[arg(long = "interval", default_value_t = DEFAULT_SAMPLE_SECONDS, help = "Sampling interval in seconds")]
    sample_seconds: f64,
    #[arg(long = "idle-threshold", default_value_t = DEFAULT_IDLE_MINUTES, help = "Minutes of inactivity before time counts as idle")]
    idle_minutes: f64,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run the collector in the current console until Ctrl+C")]
    Collect {
        #[command(flatten)]
        collector: CollectorArgs,
    },
    #[command(about = "Print a summary of one day")]
    Summary {
        #[command(flatten)]
        command: SummaryCommand,
    },
    #[command(about = "Serve the query API with the collector running in the background")]
    Web {
        #[arg(long, default_value = "127.0.0.1", help = "Interface to bind")]
        host: String,
        #[arg(long, default_value_t = DEFAULT_PORT, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        #[command(flatten)]
        collector: CollectorArgs,
        #[arg(
            long = "flush-interval",
            help = "Seconds between writes to the database. Defaults to six sampling intervals, at least 30 seconds"
        )]
        flush_seconds: Option<f64>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.verbose {
        Some(LevelFilter::DEBUG)
    } else {
        None
    };
    let log_dir = create_application_default_path()?.join("logs");

    match args.commands {
        Commands::Collect { collector } => {
            enable_logging(COLLECTOR_PREFIX, &log_dir, logging_level, true)?;
            let context = collector.into_context(None)?;
            run_collector(context).await
        }
        Commands::Summary { command } => {
            enable_logging(CLI_PREFIX, &log_dir, logging_level, args.verbose)?;
            let db_path = resolve_db(command.db().cloned())?;
            process_summary_command(command, db_path).await
        }
        Commands::Web {
            host,
            port,
            collector,
            flush_seconds,
        } => {
            enable_logging(COLLECTOR_PREFIX, &log_dir, logging_level, true)?;
            let context = collector.into_context(flush_seconds)?;
            let listener = TcpListener::bind((host.as_str(), port)).await?;
            run_web(context, listener).await
        }
    }
}

impl CollectorArgs {
    fn into_context(self, flush_seconds: Option<f64>) -> Result<AppContext> {
        let settings = CollectorSettings::from_intervals(
            self.sample_seconds,
            self.idle_minutes,
            flush_seconds,
            None,
        )?;
        Ok(AppContext::new(
            resolve_db(self.db)?,
            settings,
            Arc::new(DefaultClock),
        ))
    }
}

fn resolve_db(db: Option<PathBuf>) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path),
        None => default_database_path(),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Args, Commands};

    #[test]
    fn web_defaults() {
        let args = Args::try_parse_from(["timetrail", "web"]).unwrap();
        let Commands::Web {
            host,
            port,
            collector,
            flush_seconds,
        } = args.commands
        else {
            panic!("expected web command");
        };
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8765);
        assert_eq!(collector.sample_seconds, 5.);
        assert_eq!(collector.idle_minutes, 5.);
        assert_eq!(flush_seconds, None);
        assert!(!args.verbose);
    }

    #[test]
    fn verbose_is_accepted_after_subcommand() {
        let args = Args::try_parse_from(["timetrail", "collect", "--interval", "2", "--verbose"])
            .unwrap();
        assert!(args.verbose);
        let Commands::Collect { collector } = args.commands else {
            panic!("expected collect command");
        };
        assert_eq!(collector.sample_seconds, 2.);
    }

    #[test]
    fn rejects_port_zero() {
        assert!(Args::try_parse_from(["timetrail", "web", "--port", "0"]).is_err());
    }

    #[test]
    fn out_of_range_interval_is_a_config_error() {
        let args = Args::try_parse_from(["timetrail", "collect", "--interval", "0.5"]).unwrap();
        let Commands::Collect { collector } = args.commands else {
            panic!("expected collect command");
        };
        assert!(collector.into_context(None).is_err());
    }
}
