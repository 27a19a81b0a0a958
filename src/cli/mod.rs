pub mod manage;
pub mod output;
pub mod shutdown;
pub mod track;

use std::{fmt::Display, path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use manage::{
    process_entry_command, process_project_command, process_settings_command,
    process_tag_command, EntryCommand, ProjectCommand, SettingsCommand, TagCommand,
};
use output::{
    process_backup_command, process_export_command, process_report_command, BackupCommand,
    ExportCommand, ReportCommand,
};
use tracing::level_filters::LevelFilter;
use track::{process_idle_watch_command, process_track_command, TrackCommand};

use crate::{
    config::{BackendKind, Config},
    store::{backend::open_backend, ids::UuidGenerator, DataStore},
    utils::{
        clock::{Clock, DefaultClock},
        logging::{enable_logging, CLI_PREFIX, TRACK_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Chronify", version, long_about = None)]
#[command(about = "Time tracking for projects, right in the terminal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default $XDG_DATA_HOME/chronify or $HOME/.local/share/chronify"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Additional configuration file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Storage backend for the application data")]
    backend: Option<BackendKind>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long, global = true, help = "Log level, for example \"debug\" or \"trace\"")]
    log_level: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start the timer and track time interactively")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(subcommand, about = "Manage projects")]
    Project(ProjectCommand),
    #[command(subcommand, about = "Manage recorded time entries")]
    Entry(EntryCommand),
    #[command(subcommand, about = "Manage tags")]
    Tag(TagCommand),
    #[command(subcommand, about = "Show or change settings")]
    Settings(SettingsCommand),
    #[command(about = "Summarize tracked time")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(subcommand, about = "Export time entries to a file")]
    Export(ExportCommand),
    #[command(subcommand, about = "Export, import or reset all data")]
    Backup(BackupCommand),
    #[command(about = "Only run the idle reminder until interrupted")]
    IdleWatch {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load_from(args.config.as_deref())?;
    if let Some(dir) = args.dir {
        config.data_dir = dir;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let prefix = match args.commands {
        Commands::Track { .. } | Commands::IdleWatch {} => TRACK_PREFIX,
        _ => CLI_PREFIX,
    };
    let logging_level = args
        .log_level
        .or(if args.log { Some(LevelFilter::TRACE) } else { None });
    enable_logging(prefix, &config.log_dir(), logging_level, args.log)?;

    let context = AppContext::new(config);

    match args.commands {
        Commands::Track { command } => process_track_command(&context, command).await,
        Commands::Project(command) => process_project_command(&context, command).await,
        Commands::Entry(command) => process_entry_command(&context, command).await,
        Commands::Tag(command) => process_tag_command(&context, command).await,
        Commands::Settings(command) => process_settings_command(&context, command).await,
        Commands::Report { command } => process_report_command(&context, command).await,
        Commands::Export(command) => process_export_command(&context, command).await,
        Commands::Backup(command) => process_backup_command(&context, command).await,
        Commands::IdleWatch {} => process_idle_watch_command(&context).await,
    }
}

/// What every command needs to reach the data.
pub struct AppContext {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(DefaultClock),
        }
    }

    pub async fn open_store(&self) -> DataStore {
        let backend = open_backend(self.config.backend, &self.config.data_dir);
        DataStore::open(backend, Box::new(UuidGenerator), self.clock.clone()).await
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum DateStyle {
    #[default]
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses human dates such as "yesterday", "1 hour ago" or "15/03/2025 14:30".
/// A written date that the parser skipped is an error rather than a silent "today".
pub fn parse_moment(value: &str, now: DateTime<Local>, style: DateStyle) -> Result<DateTime<Local>> {
    let parse = |value: &str| {
        parse_date_string(value, now, style.into())
            .map_err(|e| validation_error(format!("Failed to parse date \"{value}\" {e}")))
    };

    let moment = parse(value)?;
    if let Some(date) = value.split_whitespace().find(|v| v.contains('/')) {
        if parse(date)?.date_naive() != moment.date_naive() {
            return Err(validation_error(format!(
                "The date in \"{value}\" was ignored. Put it before the time, for example \"15/03/2025 09:00\""
            )));
        }
    }
    Ok(moment)
}

/// Error rendered the same way clap renders bad arguments.
pub fn validation_error(message: impl Display) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local, TimeZone, Timelike};
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_nested_commands() {
        let args = Args::try_parse_from([
            "chronify",
            "--dir",
            "/tmp/chronify",
            "project",
            "add",
            "Client Work",
            "--color",
            "#40C057",
        ])
        .unwrap();
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/chronify")));
        assert!(matches!(args.commands, Commands::Project(ProjectCommand::Add { .. })));
    }

    #[test]
    fn parses_track_options() {
        let args = Args::try_parse_from([
            "chronify", "track", "--project", "p1", "--tag", "t1", "--tag", "t2",
        ])
        .unwrap();
        let Commands::Track { command } = args.commands else {
            panic!("expected track");
        };
        assert_eq!(command.project.as_deref(), Some("p1"));
        assert_eq!(command.tags, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[test]
    fn parses_dates_in_both_styles() {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let uk = parse_moment("03/04/2025 14:30", now, DateStyle::Uk).unwrap();
        assert_eq!((uk.day(), uk.month(), uk.hour()), (3, 4, 14));
        let us = parse_moment("03/04/2025 14:30", now, DateStyle::Us).unwrap();
        assert_eq!((us.day(), us.month()), (4, 3));
        assert!(parse_moment("not a date at all", now, DateStyle::Uk).is_err());
    }

    #[test]
    fn time_before_date_is_rejected() {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 18, 0, 0).unwrap();
        assert!(parse_moment("09:00 15/03/2025", now, DateStyle::Uk).is_err());

        let moment = parse_moment("15/03/2025 09:00", now, DateStyle::Uk).unwrap();
        assert_eq!(moment.date_naive().to_string(), "2025-03-15");
        assert_eq!(moment.hour(), 9);

        let today = parse_moment("20/03/2025 09:00", now, DateStyle::Uk).unwrap();
        assert_eq!(today.date_naive().to_string(), "2025-03-20");
    }
}
