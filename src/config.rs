//! Runtime configuration
//!
//! Loaded once per process, from `NATIVECALL_CONFIG` and environment
//! overrides unless an embedder installs one first.

use crate::callback::MAX_CALLBACKS;
use crate::logging::{log_invariant_violation, LogConfig};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

static SETTINGS: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LogConfig,

    #[serde(default)]
    pub callbacks: CallbackConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Slots handed out by the trampoline backend
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Clear errno before each native call and report it afterwards
    #[serde(default = "default_true")]
    pub capture_errno: bool,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_CALLBACKS,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            capture_errno: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    MAX_CALLBACKS
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Read(String),
    Write(String),
    Parse(String),
    Serialize(String),
    /// Callback capacity outside `1..=MAX_CALLBACKS`
    InvalidCapacity(usize),
    InvalidEnv { var: &'static str, value: String },
    AlreadyInstalled,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(msg) => write!(f, "Failed to read config: {}", msg),
            Self::Write(msg) => write!(f, "Failed to write config: {}", msg),
            Self::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            Self::Serialize(msg) => write!(f, "Failed to serialize config: {}", msg),
            Self::InvalidCapacity(n) => write!(
                f,
                "Callback capacity must be between 1 and {}, got {}",
                MAX_CALLBACKS, n
            ),
            Self::InvalidEnv { var, value } => {
                write!(f, "Invalid value for {}: {:?}", var, value)
            }
            Self::AlreadyInstalled => write!(f, "Configuration is already in effect"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration from the environment
    ///
    /// `NATIVECALL_CONFIG` names a TOML file; `NATIVECALL_CALLBACK_CAPACITY`,
    /// `NATIVECALL_CAPTURE_ERRNO` and the `NATIVECALL_LOG_*` variables
    /// override individual settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("NATIVECALL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(value) = std::env::var("NATIVECALL_CALLBACK_CAPACITY") {
            config.callbacks.capacity =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "NATIVECALL_CALLBACK_CAPACITY",
                    value: value.clone(),
                })?;
        }

        if let Ok(value) = std::env::var("NATIVECALL_CAPTURE_ERRNO") {
            config.gateway.capture_errno = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                var: "NATIVECALL_CAPTURE_ERRNO",
                value: value.clone(),
            })?;
        }

        config.logging.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CALLBACKS).contains(&self.callbacks.capacity) {
            return Err(ConfigError::InvalidCapacity(self.callbacks.capacity));
        }
        Ok(())
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::Write(format!("{}: {}", path.display(), e)))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Make `config` the process configuration
///
/// Fails once any component has read the configuration.
pub fn install(config: Config) -> Result<(), ConfigError> {
    config.validate()?;
    SETTINGS
        .set(config)
        .map_err(|_| ConfigError::AlreadyInstalled)
}

/// The process configuration
///
/// An unreadable or malformed environment falls back to defaults with a
/// logged warning. An out-of-range callback capacity is fatal.
pub fn settings() -> &'static Config {
    SETTINGS.get_or_init(|| resolve(Config::from_env()))
}

fn resolve(loaded: Result<Config, ConfigError>) -> Config {
    match loaded {
        Ok(config) => config,
        Err(err @ ConfigError::InvalidCapacity(_)) => {
            log_invariant_violation("callback capacity", &err.to_string());
            panic!("{}", err);
        }
        Err(err) => {
            tracing::warn!(
                event = "config_rejected",
                error = %err,
                "Using default configuration"
            );
            Config::default()
        }
    }
}
