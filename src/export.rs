//! CSV and plain-text renderings of time entries, plus the file names they are saved under.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

pub use crate::store::backup::backup_file_name;
use crate::{
    report::display_project_name,
    store::entities::{Project, TimeEntry},
    utils::time::{format_duration, TIME_FORMAT},
};

const FILE_PREFIX: &str = "chronify";
const REPORT_TITLE: &str = "Chronify Time Report";

pub const CSV_HEADER: [&str; 7] = [
    "Project",
    "Description",
    "Date",
    "Start Time",
    "End Time",
    "Duration (Formatted)",
    "Duration (Seconds)",
];

const REPORT_HEADER: [&str; 5] = ["Project", "Description", "Date", "Time Range", "Duration"];

/// One exported entry with every column already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub project: String,
    pub description: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_formatted: String,
    pub duration_seconds: u64,
}

impl ExportRow {
    pub fn from_entry<Tz: TimeZone>(entry: &TimeEntry, projects: &[Project], tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            project: display_project_name(projects, entry.project_id.as_deref()).to_string(),
            description: entry.description.clone().unwrap_or_default(),
            date: entry.date.clone(),
            start_time: time_of_day(entry.start_time, tz),
            end_time: entry
                .end_time
                .map(|v| time_of_day(v, tz))
                .unwrap_or_default(),
            duration_formatted: format_duration(entry.duration),
            duration_seconds: entry.duration,
        }
    }

    fn csv_values(&self) -> [String; 7] {
        [
            self.project.clone(),
            self.description.clone(),
            self.date.clone(),
            self.start_time.clone(),
            self.end_time.clone(),
            self.duration_formatted.clone(),
            self.duration_seconds.to_string(),
        ]
    }

    fn report_values(&self) -> [String; 5] {
        [
            self.project.clone(),
            self.description.clone(),
            self.date.clone(),
            format!("{} - {}", self.start_time, self.end_time),
            self.duration_formatted.clone(),
        ]
    }
}

pub fn export_rows<Tz: TimeZone>(
    entries: &[TimeEntry],
    projects: &[Project],
    tz: &Tz,
) -> Vec<ExportRow>
where
    Tz::Offset: std::fmt::Display,
{
    entries
        .iter()
        .map(|v| ExportRow::from_entry(v, projects, tz))
        .collect()
}

/// Header plus one line per row. Every value is quoted. Nothing at all for no rows.
pub fn to_csv(rows: &[ExportRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for row in rows {
        let values = row
            .csv_values()
            .iter()
            .map(|v| quote(v))
            .collect::<Vec<_>>();
        lines.push(values.join(","));
    }
    lines.join("\n")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Printable table of `rows` with a grand total footer.
pub fn render_text_report<Tz: TimeZone>(rows: &[ExportRow], generated_on: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let total = rows.iter().map(|v| v.duration_seconds).sum::<u64>();
    let total = format_duration(total);

    let header = REPORT_HEADER.map(String::from);
    let body = rows.iter().map(ExportRow::report_values).collect::<Vec<_>>();
    let footer = [
        String::new(),
        String::new(),
        String::new(),
        "Grand Total".to_string(),
        total.clone(),
    ];

    let mut widths = [0usize; 5];
    for row in std::iter::once(&header)
        .chain(body.iter())
        .chain(std::iter::once(&footer))
    {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|v| "-".repeat(*v))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut lines = vec![
        REPORT_TITLE.to_string(),
        format!("Generated on: {}", generated_on.format("%Y-%m-%d %H:%M")),
        format!("Total Duration: {total}"),
        String::new(),
        table_line(&header, &widths),
        separator.clone(),
    ];
    lines.extend(body.iter().map(|v| table_line(v, &widths)));
    lines.push(separator);
    lines.push(table_line(&footer, &widths));

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn table_line(values: &[String; 5], widths: &[usize; 5]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Csv,
    Report,
}

impl ExportKind {
    fn stem(self) -> &'static str {
        match self {
            ExportKind::Csv => "export",
            ExportKind::Report => "report",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportKind::Csv => "csv",
            ExportKind::Report => "txt",
        }
    }
}

/// `chronify_[<project>_]<kind>_<YYYY-MM-DD_HHmm>.<ext>`
pub fn export_file_name(kind: ExportKind, project_name: Option<&str>, at: NaiveDateTime) -> String {
    let project = project_name
        .map(|v| format!("{}_", slug(v)))
        .unwrap_or_default();
    format!(
        "{FILE_PREFIX}_{project}{}_{}.{}",
        kind.stem(),
        at.format("%Y-%m-%d_%H%M"),
        kind.extension()
    )
}

/// Lowercase with every character other than ASCII letters and digits replaced by `_`.
pub fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn time_of_day<Tz: TimeZone>(moment: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    moment.with_timezone(tz).format(TIME_FORMAT).to_string()
}
