//! Application-level configuration loading: data location, persistence retries and spin tuning.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    engine::{SpinSettings, SpinVariant, animation::HighlightTiming},
    state::groups::RetryPolicy,
};

/// Default location on disk where the application looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LOTTERY_WHEEL_CONFIG_PATH";
/// Directory created under the platform data dir.
const APP_DIR: &str = "lottery-wheel";
/// Name of the persisted document.
const DATA_FILE: &str = "data.json";

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    data_path: PathBuf,
    retry: RetryPolicy,
    spin: SpinSettings,
}

impl AppConfig {
    /// Load the configuration from the default or overridden path, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`, falling back to defaults on any problem.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        data_path = %app_config.data_path.display(),
                        variant = ?app_config.spin.variant,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "invalid config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Location of the persisted group document.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Retry policy for persistence writes.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Animation settings of the selection engine.
    pub fn spin_settings(&self) -> &SpinSettings {
        &self.spin
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("out of range values: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

fn parse(contents: &str) -> Result<AppConfig, ConfigError> {
    let raw: RawConfig = serde_json::from_str(contents)?;
    raw.validate()?;
    Ok(raw.into())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_path: Option<PathBuf>,
    #[validate(nested)]
    persistence: RawPersistence,
    #[validate(nested)]
    spin: RawSpin,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawPersistence {
    #[validate(range(min = 1, max = 10))]
    save_attempts: u32,
    #[validate(range(max = 2000))]
    retry_delay_ms: u64,
}

impl Default for RawPersistence {
    fn default() -> Self {
        Self {
            save_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawSpin {
    variant: SpinVariant,
    #[validate(range(min = 1, max = 100))]
    min_turns: u32,
    #[validate(range(min = 100, max = 60_000))]
    duration_ms: u64,
    #[validate(range(min = 1, max = 1000))]
    tick_interval_ms: u64,
    #[validate(range(max = 10_000))]
    reveal_delay_ms: u64,
    #[validate(nested)]
    discrete: RawDiscrete,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self {
            variant: SpinVariant::Continuous,
            min_turns: 8,
            duration_ms: 5000,
            tick_interval_ms: 16,
            reveal_delay_ms: 500,
            discrete: RawDiscrete::default(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawDiscrete {
    #[validate(range(max = 20))]
    min_rounds: u32,
    #[validate(range(min = 1, max = 1000))]
    initial_delay_ms: u64,
    #[validate(range(max = 1000))]
    delay_step_ms: u64,
    #[validate(range(min = 1, max = 5000))]
    max_delay_ms: u64,
}

impl Default for RawDiscrete {
    fn default() -> Self {
        Self {
            min_rounds: 3,
            initial_delay_ms: 50,
            delay_step_ms: 15,
            max_delay_ms: 600,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let spin = value.spin;
        Self {
            data_path: value.data_path.unwrap_or_else(default_data_path),
            retry: RetryPolicy {
                attempts: value.persistence.save_attempts,
                initial_delay: Duration::from_millis(value.persistence.retry_delay_ms),
            },
            spin: SpinSettings {
                variant: spin.variant,
                min_turns: spin.min_turns,
                duration: Duration::from_millis(spin.duration_ms),
                tick_interval: Duration::from_millis(spin.tick_interval_ms),
                reveal_delay: Duration::from_millis(spin.reveal_delay_ms),
                highlight: HighlightTiming {
                    min_rounds: spin.discrete.min_rounds,
                    initial_delay: Duration::from_millis(spin.discrete.initial_delay_ms),
                    delay_step: Duration::from_millis(spin.discrete.delay_step_ms),
                    max_delay: Duration::from_millis(spin.discrete.max_delay_ms),
                },
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Platform data directory, or the working directory when none is known.
fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join(DATA_FILE)
}
