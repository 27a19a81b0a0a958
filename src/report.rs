//! Aggregations over finished time entries: totals per project and per day for a date range.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use now::DateTimeNow;

use crate::store::{
    entities::{AppData, Project, TimeEntry, WeekStart},
    NO_PROJECT,
};

pub const UNKNOWN_PROJECT: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RangePreset {
    Today,
    Week,
    Month,
    Year,
    All,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportRange {
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Resolves a preset around `today`. `All` begins on the day of the earliest finished entry.
    pub fn preset<Tz: TimeZone>(
        preset: RangePreset,
        today: NaiveDate,
        week_starts_on: WeekStart,
        entries: &[TimeEntry],
        tz: &Tz,
    ) -> Self {
        let anchor = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
        match preset {
            RangePreset::Today => Self::custom(today, today),
            RangePreset::Week => {
                let offset = match week_starts_on {
                    WeekStart::Monday => today.weekday().num_days_from_monday(),
                    WeekStart::Sunday => today.weekday().num_days_from_sunday(),
                };
                let start = today - Duration::days(i64::from(offset));
                Self::custom(start, start + Duration::days(6))
            }
            RangePreset::Month => Self::custom(
                anchor.beginning_of_month().date_naive(),
                anchor.end_of_month().date_naive(),
            ),
            RangePreset::Year => Self::custom(
                anchor.beginning_of_year().date_naive(),
                anchor.end_of_year().date_naive(),
            ),
            RangePreset::All => {
                let earliest = entries
                    .iter()
                    .filter(|v| !v.is_running())
                    .map(|v| local_date(v.start_time, tz))
                    .min()
                    .unwrap_or(today);
                Self::custom(earliest.min(today), today)
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day of the range in order. Empty when the range is reversed.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |v| *v <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTotal {
    pub project_id: String,
    pub name: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub range: ReportRange,
    pub entries: Vec<TimeEntry>,
    pub total_seconds: u64,
    /// Sorted by duration, longest first. Entries without a project are not listed.
    pub projects: Vec<ProjectTotal>,
    pub days: Vec<DayTotal>,
}

impl Report {
    pub fn build<Tz: TimeZone>(
        data: &AppData,
        range: ReportRange,
        project_id: Option<&str>,
        tz: &Tz,
    ) -> Self {
        let entries = filter_entries(&data.time_entries, range, project_id, tz);
        let total_seconds = entries.iter().map(|v| v.duration).sum();

        let mut per_project = HashMap::<&str, u64>::new();
        for entry in &entries {
            if let Some(id) = entry.project_id.as_deref() {
                *per_project.entry(id).or_default() += entry.duration;
            }
        }
        let mut projects = per_project
            .into_iter()
            .map(|(id, seconds)| ProjectTotal {
                project_id: id.to_string(),
                name: find_project(&data.projects, id)
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PROJECT.to_string()),
                seconds,
            })
            .collect::<Vec<_>>();
        projects.sort_by(|a, b| b.seconds.cmp(&a.seconds).then_with(|| a.name.cmp(&b.name)));

        let mut per_day = range
            .days()
            .map(|v| (v, 0))
            .collect::<BTreeMap<NaiveDate, u64>>();
        for entry in &entries {
            if let Some(total) = per_day.get_mut(&local_date(entry.start_time, tz)) {
                *total += entry.duration;
            }
        }
        let days = per_day
            .into_iter()
            .map(|(date, seconds)| DayTotal { date, seconds })
            .collect();

        Self {
            range,
            entries,
            total_seconds,
            projects,
            days,
        }
    }

    pub fn most_active_project(&self) -> Option<&ProjectTotal> {
        self.projects.first()
    }
}

/// Finished entries that started inside `range`, optionally limited to one project.
pub fn filter_entries<Tz: TimeZone>(
    entries: &[TimeEntry],
    range: ReportRange,
    project_id: Option<&str>,
    tz: &Tz,
) -> Vec<TimeEntry> {
    entries
        .iter()
        .filter(|v| !v.is_running())
        .filter(|v| range.contains(local_date(v.start_time, tz)))
        .filter(|v| project_id.map_or(true, |id| v.project_id.as_deref() == Some(id)))
        .cloned()
        .collect()
}

/// Groups finished entries by their stored date, newest day first.
pub fn group_by_date(entries: &[TimeEntry]) -> Vec<(&str, Vec<&TimeEntry>)> {
    let mut groups = BTreeMap::<&str, Vec<&TimeEntry>>::new();
    for entry in entries.iter().filter(|v| !v.is_running()) {
        groups.entry(entry.date.as_str()).or_default().push(entry);
    }
    groups.into_iter().rev().collect()
}

/// Name shown for an entry's project, falling back when it is missing or was deleted.
pub fn display_project_name<'a>(projects: &'a [Project], project_id: Option<&str>) -> &'a str {
    project_id
        .and_then(|id| find_project(projects, id))
        .map(|v| v.name.as_str())
        .unwrap_or(NO_PROJECT)
}

fn find_project<'a>(projects: &'a [Project], id: &str) -> Option<&'a Project> {
    projects.iter().find(|v| v.id == id)
}

pub fn local_date<Tz: TimeZone>(moment: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    moment.with_timezone(tz).date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::store::entities::{AppData, Project, TimeEntry, WeekStart};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, project: Option<&str>, day: NaiveDate, hour: u32, seconds: u64) -> TimeEntry {
        let start = Utc.from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap());
        TimeEntry {
            id: id.into(),
            project_id: project.map(Into::into),
            description: None,
            start_time: start,
            end_time: Some(start + Duration::seconds(seconds as i64)),
            duration: seconds,
            date: day.format("%Y-%m-%d").to_string(),
            tags: vec![],
            created_at: start,
            updated_at: start,
        }
    }

    fn project(id: &str, name: &str) -> Project {
        let at = Utc.from_utc_datetime(&date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap());
        Project {
            id: id.into(),
            name: name.into(),
            description: None,
            color: "#228BE6".into(),
            is_active: true,
            created_at: at,
            updated_at: at,
        }
    }

    fn sample() -> AppData {
        let mut running = entry("running", Some("a"), date(2025, 3, 12), 9, 0);
        running.end_time = None;
        AppData {
            projects: vec![project("a", "Alpha"), project("b", "Beta")],
            time_entries: vec![
                entry("1", Some("a"), date(2025, 3, 10), 9, 3600),
                entry("2", Some("b"), date(2025, 3, 10), 11, 1800),
                entry("3", Some("a"), date(2025, 3, 12), 8, 600),
                entry("4", None, date(2025, 3, 12), 14, 900),
                entry("5", Some("gone"), date(2025, 3, 13), 10, 120),
                entry("6", Some("b"), date(2025, 2, 27), 10, 5000),
                running,
            ],
            ..Default::default()
        }
    }

    #[test]
    fn week_honours_configured_start() {
        // 2025-03-12 is a Wednesday.
        let today = date(2025, 3, 12);
        let monday = ReportRange::preset(RangePreset::Week, today, WeekStart::Monday, &[], &Utc);
        assert_eq!(monday, ReportRange::custom(date(2025, 3, 10), date(2025, 3, 16)));

        let sunday = ReportRange::preset(RangePreset::Week, today, WeekStart::Sunday, &[], &Utc);
        assert_eq!(sunday, ReportRange::custom(date(2025, 3, 9), date(2025, 3, 15)));
    }

    #[test]
    fn month_and_year_cover_whole_periods() {
        let today = date(2024, 2, 10);
        let month = ReportRange::preset(RangePreset::Month, today, WeekStart::Monday, &[], &Utc);
        assert_eq!(month, ReportRange::custom(date(2024, 2, 1), date(2024, 2, 29)));

        let year = ReportRange::preset(RangePreset::Year, today, WeekStart::Monday, &[], &Utc);
        assert_eq!(year, ReportRange::custom(date(2024, 1, 1), date(2024, 12, 31)));
    }

    #[test]
    fn all_starts_at_earliest_finished_entry() {
        let data = sample();
        let range = ReportRange::preset(
            RangePreset::All,
            date(2025, 3, 14),
            WeekStart::Monday,
            &data.time_entries,
            &Utc,
        );
        assert_eq!(range, ReportRange::custom(date(2025, 2, 27), date(2025, 3, 14)));

        let empty = ReportRange::preset(RangePreset::All, date(2025, 3, 14), WeekStart::Monday, &[], &Utc);
        assert_eq!(empty.days().count(), 1);
    }

    #[test]
    fn report_totals_projects_and_days() {
        let data = sample();
        let range = ReportRange::custom(date(2025, 3, 10), date(2025, 3, 16));
        let report = Report::build(&data, range, None, &Utc);

        assert_eq!(report.entries.len(), 5);
        assert_eq!(report.total_seconds, 3600 + 1800 + 600 + 900 + 120);

        let names = report
            .projects
            .iter()
            .map(|v| (v.name.as_str(), v.seconds))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("Alpha", 4200), ("Beta", 1800), ("Unknown", 120)]);
        assert_eq!(report.most_active_project().unwrap().project_id, "a");

        assert_eq!(report.days.len(), 7);
        assert_eq!(report.days[0].seconds, 5400);
        assert_eq!(report.days[1].seconds, 0);
        assert_eq!(report.days[2].seconds, 1500);
        assert_eq!(report.days[6].seconds, 0);
    }

    #[test]
    fn report_filters_by_project() {
        let data = sample();
        let range = ReportRange::custom(date(2025, 2, 1), date(2025, 3, 31));
        let report = Report::build(&data, range, Some("b"), &Utc);

        assert_eq!(report.total_seconds, 6800);
        assert_eq!(report.projects.len(), 1);
        assert_eq!(report.projects[0].name, "Beta");
    }

    #[test]
    fn empty_report_has_no_most_active_project() {
        let data = sample();
        let range = ReportRange::custom(date(2030, 1, 1), date(2030, 1, 2));
        let report = Report::build(&data, range, None, &Utc);

        assert_eq!(report.total_seconds, 0);
        assert!(report.most_active_project().is_none());
        assert_eq!(report.days.len(), 2);
    }

    #[test]
    fn groups_finished_entries_newest_day_first() {
        let data = sample();
        let groups = group_by_date(&data.time_entries);

        let days = groups.iter().map(|(day, _)| *day).collect::<Vec<_>>();
        assert_eq!(days, vec!["2025-03-13", "2025-03-12", "2025-03-10", "2025-02-27"]);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn project_names_fall_back() {
        let data = sample();
        assert_eq!(display_project_name(&data.projects, Some("a")), "Alpha");
        assert_eq!(display_project_name(&data.projects, Some("gone")), "No Project");
        assert_eq!(display_project_name(&data.projects, None), "No Project");
    }
}
