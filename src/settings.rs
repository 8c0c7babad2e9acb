use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::tracker::Features;

pub const DEFAULT_SETTINGS_PATH: &str = "time_of_death.toml";
pub const WEBHOOK_URL_ENV: &str = "TIME_OF_DEATH_WEBHOOK_URL";
const DEFAULT_RESPAWN_TABLE_PATH: &str = "data/npcs/respawn_time.txt";
const DEFAULT_QUEUE_CAPACITY: usize = 32;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    pub log: LogSettings,
    pub respawn: RespawnSettings,
    pub webhook: WebhookSettings,
    pub features: FeatureSettings,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// A game log file, or a game folder to search for the newest one.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RespawnSettings {
    pub table_path: PathBuf,
}

impl Default for RespawnSettings {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from(DEFAULT_RESPAWN_TABLE_PATH),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub url: Option<String>,
    pub queue_capacity: usize,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl WebhookSettings {
    /// The configured URL, treating blank values as unset.
    pub fn destination(&self) -> Option<String> {
        normalized_webhook_url(self.url.as_deref())
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub track_zone: bool,
    pub normalize_time: bool,
    pub annotate_respawn: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self::from(Features::enriched())
    }
}

impl From<Features> for FeatureSettings {
    fn from(features: Features) -> Self {
        Self {
            track_zone: features.track_zone,
            normalize_time: features.normalize_time,
            annotate_respawn: features.annotate_respawn,
        }
    }
}

impl From<FeatureSettings> for Features {
    fn from(settings: FeatureSettings) -> Self {
        Self {
            track_zone: settings.track_zone,
            normalize_time: settings.normalize_time,
            annotate_respawn: settings.annotate_respawn,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults when the file does
    /// not exist, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(settings_path = %path.display(), "Settings file not found, using defaults");
                Self::default()
            }
            Err(error) => return Err(error.into()),
        };

        if let Ok(webhook_url) = std::env::var(WEBHOOK_URL_ENV) {
            settings.webhook.url = Some(webhook_url);
        }

        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn features(&self) -> Features {
        self.features.into()
    }
}

fn normalized_webhook_url(webhook_url: Option<&str>) -> Option<String> {
    webhook_url
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
