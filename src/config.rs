//! Configuration loading. Values are layered: built-in defaults, then the TOML file, then
//! `CHRONIFY_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::{
    timer::DEFAULT_TICK_INTERVAL,
    utils::dir::{application_default_path, APPLICATION_NAME},
};

/// Which storage backend to use for the application document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// File backend when the data directory is usable, key-value storage otherwise.
    #[default]
    Auto,
    File,
    LocalStorage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `data.json` and `logs/`.
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub tick_interval_ms: u64,
    pub idle_poll_interval_secs: u64,
    /// Input inactivity after which the user counts as idle again.
    pub idle_cutoff_secs: u64,
    pub desktop_notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: application_default_path().unwrap_or_else(|_| PathBuf::from(".")),
            backend: BackendKind::Auto,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            idle_poll_interval_secs: 5,
            idle_cutoff_secs: 5,
            desktop_notifications: true,
        }
    }
}

impl Config {
    /// `config_path` is merged over the user's config file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(
                config_dir.join(APPLICATION_NAME).join("config.toml"),
            ));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("CHRONIFY_")).extract()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_secs(self.idle_poll_interval_secs.max(1))
    }

    pub fn idle_cutoff(&self) -> Duration {
        Duration::from_secs(self.idle_cutoff_secs)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
