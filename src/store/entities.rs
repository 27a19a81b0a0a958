use std::cmp::Ordering;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::{timer::StopResult, utils::time::entry_date};

pub const DATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Tr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    #[default]
    Timer,
    Timesheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme: ThemeMode,
    pub primary_color: String,
    pub locale: Locale,
    pub default_view: DefaultView,
    pub week_starts_on: WeekStart,
    pub idle_reminder_enabled: bool,
    /// 0 disables the reminder just like the flag does.
    pub idle_reminder_minutes: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::Dark,
            primary_color: "#E03131".into(),
            locale: Locale::En,
            default_view: DefaultView::Timer,
            week_starts_on: WeekStart::Monday,
            idle_reminder_enabled: true,
            idle_reminder_minutes: 15,
        }
    }
}

/// Partial settings update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub theme: Option<ThemeMode>,
    pub primary_color: Option<String>,
    pub locale: Option<Locale>,
    pub default_view: Option<DefaultView>,
    pub week_starts_on: Option<WeekStart>,
    pub idle_reminder_enabled: Option<bool>,
    pub idle_reminder_minutes: Option<u32>,
}

impl SettingsPatch {
    pub fn apply(self, settings: &mut AppSettings) {
        if let Some(v) = self.theme {
            settings.theme = v;
        }
        if let Some(v) = self.primary_color {
            settings.primary_color = v;
        }
        if let Some(v) = self.locale {
            settings.locale = v;
        }
        if let Some(v) = self.default_view {
            settings.default_view = v;
        }
        if let Some(v) = self.week_starts_on {
            settings.week_starts_on = v;
        }
        if let Some(v) = self.idle_reminder_enabled {
            settings.idle_reminder_enabled = v;
        }
        if let Some(v) = self.idle_reminder_minutes {
            settings.idle_reminder_minutes = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project fields supplied by the caller. Name emptiness is checked by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

impl ProjectPatch {
    pub fn apply(self, project: &mut Project) {
        if let Some(v) = self.name {
            project.name = v;
        }
        if let Some(v) = self.description {
            project.description = v;
        }
        if let Some(v) = self.color {
            project.color = v;
        }
        if let Some(v) = self.is_active {
            project.is_active = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    /// May point to a project that no longer exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds. Only meaningful once `end_time` is set.
    #[serde(default)]
    pub duration: u64,
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Entries without an end are still being tracked and stay out of history.
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub project_id: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: u64,
    pub date: String,
    pub tags: Vec<String>,
}

impl From<StopResult> for NewTimeEntry {
    fn from(
        StopResult {
            duration,
            start_time,
            end_time,
            project_id,
            description,
            tags,
        }: StopResult,
    ) -> Self {
        NewTimeEntry {
            project_id,
            description: Some(description).filter(|v| !v.is_empty()),
            date: entry_date(start_time),
            start_time,
            end_time: Some(end_time),
            duration,
            tags,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeEntryPatch {
    pub project_id: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<u64>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TimeEntryPatch {
    pub fn apply(self, entry: &mut TimeEntry) {
        if let Some(v) = self.project_id {
            entry.project_id = v;
        }
        if let Some(v) = self.description {
            entry.description = v;
        }
        if let Some(v) = self.start_time {
            entry.start_time = v;
        }
        if let Some(v) = self.end_time {
            entry.end_time = v;
        }
        if let Some(v) = self.duration {
            entry.duration = v;
        }
        if let Some(v) = self.date {
            entry.date = v;
        }
        if let Some(v) = self.tags {
            entry.tags = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

/// The whole persisted state. It is always saved and loaded as one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default = "data_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: AppSettings,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

fn data_version() -> u32 {
    DATA_VERSION
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            settings: AppSettings::default(),
            projects: vec![],
            time_entries: vec![],
            tags: vec![],
        }
    }
}

impl AppData {
    /// Applies the storage order: active projects first, then most recently updated; newest
    /// entries first. Sorting is stable, so applying it twice changes nothing.
    pub fn sort(&mut self) {
        self.projects.sort_by(compare_projects);
        self.time_entries
            .sort_by(|a, b| b.start_time.cmp(&a.start_time));
    }

    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }
}

fn compare_projects(a: &Project, b: &Project) -> Ordering {
    b.is_active
        .cmp(&a.is_active)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}
