use std::path::Path;

use anyhow::Result;
use tracing::{level_filters::LevelFilter, warn};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::{
    format::FmtSpan,
    writer::{BoxMakeWriter, MakeWriterExt},
};

pub const CLI_PREFIX: &str = "cli";
pub const TRACK_PREFIX: &str = "track";

/// Installs the global subscriber. Logs go to daily rotated files inside `log_dir`; stdout only
/// receives them when `show_std` is set. An unusable `log_dir` sends everything to stderr instead
/// so that commands still run.
pub fn enable_logging(
    prefix: &str,
    log_dir: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let (writer, file_error) = match file_writer(prefix, log_dir, show_std) {
        Ok(writer) => (writer, None),
        Err(e) => (BoxMakeWriter::new(std::io::stderr), Some(e)),
    };

    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace("-", "_"),
        )))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(writer)
        .pretty()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger {e}"))?;

    if let Some(e) = file_error {
        warn!("Log directory {log_dir:?} is unusable, logging to stderr {e:?}");
    }
    Ok(())
}

fn file_writer(prefix: &str, log_dir: &Path, show_std: bool) -> Result<BoxMakeWriter> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(prefix)
        .build(log_dir)?;

    let stdout = std::io::stdout.with_filter(move |_| show_std);
    Ok(BoxMakeWriter::new(stdout.and(appender)))
}

#[cfg(test)]
pub static TEST_LOGGING: std::sync::LazyLock<()> = std::sync::LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});

#[cfg(test)]
mod tests {
    use tempfile::{tempdir, NamedTempFile};

    use super::*;

    #[test]
    fn file_logging_needs_a_usable_directory() {
        let dir = tempdir().unwrap();
        assert!(file_writer(CLI_PREFIX, &dir.path().join("logs"), false).is_ok());

        let file = NamedTempFile::new().unwrap();
        assert!(file_writer(CLI_PREFIX, &file.path().join("logs"), false).is_err());
    }
}
