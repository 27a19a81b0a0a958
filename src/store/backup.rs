//! Backup files are the full application document as indented JSON.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use super::entities::AppData;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("backup is missing the `{0}` list")]
    MissingField(&'static str),
    #[error("backup has an unreadable document: {0}")]
    InvalidDocument(#[source] serde_json::Error),
    #[error("failed to serialize backup: {0}")]
    Serialize(#[source] serde_json::Error),
}

const REQUIRED_LISTS: [&str; 2] = ["projects", "timeEntries"];

pub fn export_backup(data: &AppData) -> Result<String, BackupError> {
    serde_json::to_string_pretty(data).map_err(BackupError::Serialize)
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("chronify_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Parses a backup. Nothing is accepted unless both `projects` and `timeEntries` are present as
/// lists.
pub fn parse_backup(content: &str) -> Result<AppData, BackupError> {
    let value: Value = serde_json::from_str(content).map_err(BackupError::InvalidJson)?;
    for field in REQUIRED_LISTS {
        if !value.get(field).is_some_and(Value::is_array) {
            return Err(BackupError::MissingField(field));
        }
    }
    serde_json::from_value(value).map_err(BackupError::InvalidDocument)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_backup_parses_back() {
        let data = AppData::default();
        let json = export_backup(&data).unwrap();
        assert!(json.contains("\n  \"timeEntries\": []"));
        assert_eq!(parse_backup(&json).unwrap(), data);
    }

    #[test]
    fn rejects_backup_without_time_entries() {
        let err = parse_backup(r#"{"version":1,"projects":[]}"#).unwrap_err();
        assert!(matches!(err, BackupError::MissingField("timeEntries")));
    }

    #[test]
    fn rejects_backup_without_projects() {
        let err = parse_backup(r#"{"timeEntries":[]}"#).unwrap_err();
        assert!(matches!(err, BackupError::MissingField("projects")));
    }

    #[test]
    fn rejects_non_list_fields_and_garbage() {
        assert!(matches!(
            parse_backup(r#"{"projects":{},"timeEntries":[]}"#),
            Err(BackupError::MissingField("projects"))
        ));
        assert!(matches!(
            parse_backup("not json"),
            Err(BackupError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_backup(r#"{"projects":[{"id":1}],"timeEntries":[]}"#),
            Err(BackupError::InvalidDocument(_))
        ));
    }

    #[test]
    fn names_backups_by_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(backup_file_name(date), "chronify_backup_2025-03-15.json");
    }
}
