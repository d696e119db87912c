use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub auth_entry_path: String,
    pub typing_cooldown_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            auth_entry_path: "/auth".into(),
            typing_cooldown_ms: 600,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_url: Option<String>,
    auth_entry_path: Option<String>,
    typing_cooldown_ms: Option<u64>,
}

impl Settings {
    pub fn typing_cooldown(&self) -> Duration {
        Duration::from_millis(self.typing_cooldown_ms)
    }

    fn merge_file(&mut self, raw: &str) -> Result<(), toml::de::Error> {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.api_url {
            self.api_url = v;
        }
        if let Some(v) = file_cfg.auth_entry_path {
            self.auth_entry_path = v;
        }
        if let Some(v) = file_cfg.typing_cooldown_ms {
            self.typing_cooldown_ms = v;
        }
        Ok(())
    }

    /// Applies `BLOP_*` then `APP__*` variables; the latter win.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        for key in ["BLOP_API_URL", "APP__API_URL"] {
            if let Some(v) = lookup(key) {
                self.api_url = v;
            }
        }
        for key in ["BLOP_AUTH_ENTRY_PATH", "APP__AUTH_ENTRY_PATH"] {
            if let Some(v) = lookup(key) {
                self.auth_entry_path = v;
            }
        }
        for key in ["BLOP_TYPING_COOLDOWN_MS", "APP__TYPING_COOLDOWN_MS"] {
            if let Some(v) = lookup(key) {
                self.typing_cooldown_ms =
                    v.trim().parse().map_err(|_| SettingsError::InvalidValue {
                        key: key.to_string(),
                        value: v.clone(),
                    })?;
            }
        }
        Ok(())
    }
}

/// Defaults, overlaid by the settings file when it exists, then by the
/// environment.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => settings
            .merge_file(&raw)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config: no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}
