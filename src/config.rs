// Settings for the tool. Values are layered: built-in defaults, then an
// optional JSON file, then `META_MANAGER_*` environment variables, then
// command-line flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_API_URL: &str =
    "https://backoffice.dev.api.discomax.com/mlp-metadata-manager/meta-manager";
pub const DEFAULT_MODEL_ID: &str = "CD:personalization:mlt-batch:sllim-tg-pkg-3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "META_MANAGER_API_URL";
pub const ENV_MODEL_ID: &str = "META_MANAGER_MODEL_ID";
pub const ENV_TIMEOUT_SECS: &str = "META_MANAGER_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Resolved settings used by the API client and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the meta-manager API, without a trailing slash.
    pub api_url: String,
    /// Model targeted by the update action.
    pub model_id: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: DEFAULT_API_URL.into(),
            model_id: DEFAULT_MODEL_ID.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Partial settings, as found in a config file or given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub model_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// `<config dir>/model-register/config.json`, e.g.
    /// `~/.config/model-register/config.json` on Linux.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("model-register").join("config.json"))
    }

    /// Resolve settings from every layer. An explicit `config_path` must
    /// exist; the default path is skipped when missing.
    pub fn load(config_path: Option<&Path>, flags: &Overrides) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        match config_path {
            Some(path) => settings.merge_file(path)?,
            None => {
                if let Some(path) = Self::default_config_path().filter(|p| p.is_file()) {
                    settings.merge_file(&path)?;
                }
            }
        }
        settings.merge_env(|key| std::env::var(key).ok())?;
        settings.apply(flags.clone())?;
        Ok(settings)
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Overrides = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply(file)
    }

    /// Read the `META_MANAGER_*` variables through `lookup`.
    pub fn merge_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: raw,
            })?),
            None => None,
        };
        self.apply(Overrides {
            api_url: lookup(ENV_API_URL),
            model_id: lookup(ENV_MODEL_ID),
            timeout_secs,
        })
    }

    pub fn apply(&mut self, overrides: Overrides) -> Result<(), ConfigError> {
        if let Some(url) = overrides.api_url {
            let trimmed = url.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "api_url",
                    value: url,
                });
            }
            self.api_url = trimmed.to_string();
        }
        if let Some(id) = overrides.model_id {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "model_id",
                    value: id,
                });
            }
            self.model_id = id.trim().to_string();
        }
        if let Some(secs) = overrides.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "timeout_secs",
                    value: secs.to_string(),
                });
            }
            self.timeout_secs = secs;
        }
        Ok(())
    }
}
