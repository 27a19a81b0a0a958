use std::path::PathBuf;

use ansi_term::Colour;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tracing::info;

use super::{parse_moment, validation_error, AppContext, DateStyle};
use crate::{
    export::{export_file_name, export_rows, render_text_report, to_csv, ExportKind},
    report::{RangePreset, Report, ReportRange},
    store::{
        backup::{backup_file_name, export_backup},
        entities::AppData,
    },
    utils::time::format_duration,
};

const BAR_WIDTH: u64 = 30;

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(long, short, value_enum, default_value_t = RangePreset::Month)]
    range: RangePreset,
    #[arg(
        long,
        short,
        requires = "end",
        help = "Start of a custom range, for example \"15/03/2025\" or \"last monday\""
    )]
    start: Option<String>,
    #[arg(long, short, requires = "start", help = "End of a custom range")]
    end: Option<String>,
    #[arg(long, short, help = "Only entries of this project")]
    project: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Debug, Subcommand)]
pub enum ExportCommand {
    #[command(about = "Write entries as CSV")]
    Csv {
        #[command(flatten)]
        filter: ReportCommand,
        #[arg(long, short, help = "Directory to write into. Defaults to the current one")]
        output: Option<PathBuf>,
    },
    #[command(about = "Write a printable report with totals")]
    Report {
        #[command(flatten)]
        filter: ReportCommand,
        #[arg(long, short, help = "Directory to write into. Defaults to the current one")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    #[command(about = "Write all data to a JSON backup")]
    Export {
        #[arg(long, short, help = "Directory to write into. Defaults to the current one")]
        output: Option<PathBuf>,
    },
    #[command(about = "Replace all data with a backup")]
    Import { file: PathBuf },
    #[command(about = "Delete all data and restore default settings")]
    Reset {
        #[arg(long, help = "Confirm that everything should be deleted")]
        yes: bool,
    },
}

impl ReportCommand {
    fn range(&self, data: &AppData, now: DateTime<Local>) -> Result<ReportRange> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => {
                let start = parse_moment(start, now, self.date_style)?.date_naive();
                let end = parse_moment(end, now, self.date_style)?.date_naive();
                if end < start {
                    return Err(validation_error("End of the range is before its start"));
                }
                Ok(ReportRange::custom(start, end))
            }
            _ => Ok(ReportRange::preset(
                self.range,
                now.date_naive(),
                data.settings.week_starts_on,
                &data.time_entries,
                &Local,
            )),
        }
    }

    fn build(&self, data: &AppData, now: DateTime<Local>) -> Result<Report> {
        if let Some(id) = self.project.as_deref() {
            if !data.projects.iter().any(|v| v.id == id) {
                return Err(validation_error(format!("No project with id {id}")));
            }
        }
        let range = self.range(data, now)?;
        Ok(Report::build(data, range, self.project.as_deref(), &Local))
    }
}

pub async fn process_report_command(context: &AppContext, command: ReportCommand) -> Result<()> {
    let store = context.open_store().await;
    let report = command.build(store.data(), Local::now());
    store.close().await?;
    print_report(&report?);
    Ok(())
}

fn print_report(report: &Report) {
    println!(
        "{} - {}",
        report.range.start.format("%d %b %Y"),
        report.range.end.format("%d %b %Y")
    );
    println!(
        "Total\t{}\t{} entries",
        Colour::Green.bold().paint(format_duration(report.total_seconds)),
        report.entries.len()
    );
    match report.most_active_project() {
        Some(project) => println!("Most active\t{}", Colour::Cyan.paint(&project.name)),
        None => println!("Most active\t-"),
    }
    println!();

    for project in &report.projects {
        println!(
            "{}\t{:.2}h\t{}",
            bar(project.seconds, report.total_seconds),
            hours(project.seconds),
            project.name
        );
    }
    if !report.projects.is_empty() {
        println!();
    }

    let busiest = report.days.iter().map(|v| v.seconds).max().unwrap_or(0);
    for day in &report.days {
        println!(
            "{}\t{:.2}h\t{}",
            day.date.format("%d %b"),
            hours(day.seconds),
            bar(day.seconds, busiest)
        );
    }
}

fn hours(seconds: u64) -> f64 {
    seconds as f64 / 3600.
}

fn bar(value: u64, whole: u64) -> String {
    if whole == 0 {
        return String::new();
    }
    "#".repeat((value * BAR_WIDTH / whole) as usize)
}

pub async fn process_export_command(context: &AppContext, command: ExportCommand) -> Result<()> {
    let (kind, filter, output) = match command {
        ExportCommand::Csv { filter, output } => (ExportKind::Csv, filter, output),
        ExportCommand::Report { filter, output } => (ExportKind::Report, filter, output),
    };

    let store = context.open_store().await;
    let now = Local::now();
    let prepared = filter.build(store.data(), now).map(|report| {
        let rows = export_rows(&report.entries, &store.data().projects, &Local);
        let project_name = filter
            .project
            .as_deref()
            .map(|id| store.project_name(Some(id)).to_string());
        (rows, project_name)
    });
    store.close().await?;
    let (rows, project_name) = prepared?;

    let content = match kind {
        ExportKind::Csv => to_csv(&rows),
        ExportKind::Report => render_text_report(&rows, now),
    };
    let file_name = export_file_name(kind, project_name.as_deref(), now.naive_local());
    let path = write_output(output, &file_name, content).await?;
    println!("Exported {} entries to {}", rows.len(), path.display());
    Ok(())
}

pub async fn process_backup_command(context: &AppContext, command: BackupCommand) -> Result<()> {
    let mut store = context.open_store().await;
    let result = match command {
        BackupCommand::Export { output } => {
            let content = export_backup(store.data());
            match content {
                Ok(content) => {
                    let file_name = backup_file_name(Local::now().date_naive());
                    write_output(output, &file_name, content)
                        .await
                        .map(|path| println!("Backup written to {}", path.display()))
                }
                Err(e) => Err(e.into()),
            }
        }
        BackupCommand::Import { file } => match tokio::fs::read_to_string(&file).await {
            Ok(content) => store
                .import_backup(&content)
                .map(|_| {
                    info!("Imported backup {file:?}");
                    println!(
                        "Imported {} projects and {} entries",
                        store.data().projects.len(),
                        store.data().time_entries.len()
                    )
                })
                .map_err(|e| validation_error(format!("Invalid backup file {e}"))),
            Err(e) => Err(anyhow::Error::from(e).context(format!("Failed to read {file:?}"))),
        },
        BackupCommand::Reset { yes } => {
            if yes {
                store.reset_all();
                println!("All data deleted");
                Ok(())
            } else {
                Err(validation_error(
                    "This deletes every project, entry and tag. Pass --yes to confirm",
                ))
            }
        }
    };
    store.close().await?;
    result
}

async fn write_output(dir: Option<PathBuf>, file_name: &str, content: String) -> Result<PathBuf> {
    let path = dir.unwrap_or_else(|| PathBuf::from(".")).join(file_name);
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {path:?}"))?;
    Ok(path)
}
