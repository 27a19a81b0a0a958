use chrono::{DateTime, Local, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Calendar date an entry is grouped under: the local date of its start.
pub fn entry_date(start: DateTime<Utc>) -> String {
    start.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

/// Splits seconds into zero padded hours, minutes and seconds.
pub fn timer_parts(total_seconds: u64) -> (String, String, String) {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    (
        format!("{hours:02}"),
        format!("{minutes:02}"),
        format!("{seconds:02}"),
    )
}

/// `MM:SS` below an hour, `HH:MM:SS` from an hour on.
pub fn format_duration(total_seconds: u64) -> String {
    let (hours, minutes, seconds) = timer_parts(total_seconds);
    if total_seconds >= 3600 {
        format!("{hours}:{minutes}:{seconds}")
    } else {
        format!("{minutes}:{seconds}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_durations_without_hours() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3599), "59:59");
    }

    #[test]
    fn formats_long_durations_with_hours() {
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(3 * 3600 + 61), "03:01:01");
        assert_eq!(format_duration(100 * 3600), "100:00:00");
    }

    #[test]
    fn splits_timer_parts() {
        assert_eq!(
            timer_parts(3 * 3600 + 4 * 60 + 5),
            ("03".to_string(), "04".to_string(), "05".to_string())
        );
    }
}
