use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::providers::http::DEFAULT_HTTP_TIMEOUT;
use crate::providers::session::DEFAULT_SESSION_TIMEOUT;
use crate::registry::ProviderOptions;

fn default_keys_file() -> PathBuf {
    PathBuf::from("keys")
}

fn default_session_timeout() -> Duration {
    DEFAULT_SESSION_TIMEOUT
}

fn default_http_timeout() -> Duration {
    DEFAULT_HTTP_TIMEOUT
}

/// Live-session (WebSocket) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long to wait for a streaming provider to deliver balances.
    /// Running out of time yields an empty result for that provider.
    #[serde(
        default = "default_session_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: default_session_timeout(),
        }
    }
}

/// REST transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(
        default = "default_http_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
        }
    }
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Decimal places printed for each total.
    ///
    /// Presentation only; totals are always computed exactly.
    pub decimals: u32,

    /// Leave currencies whose total is zero out of the report.
    pub hide_zero: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            decimals: 4,
            hide_zero: false,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also append log lines to this file. Relative paths resolve from the
    /// config file location.
    pub file: Option<PathBuf>,

    /// Emit JSON log lines instead of human-readable text.
    pub json: bool,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential file. If relative, resolved from config file location.
    pub keys_file: PathBuf,

    pub session: SessionConfig,

    pub http: HttpConfig,

    pub display: DisplayConfig,

    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keys_file: default_keys_file(),
            session: SessionConfig::default(),
            http: HttpConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the key file path against `config_dir`.
    pub fn resolve_keys_file(&self, config_dir: &Path) -> PathBuf {
        resolve_against(&self.keys_file, config_dir)
    }
}

fn resolve_against(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Where the configuration was (or would have been) read from.
    pub config_path: PathBuf,

    /// The resolved credential file path.
    pub keys_file: PathBuf,

    pub session: SessionConfig,

    pub http: HttpConfig,

    pub display: DisplayConfig,

    /// Logging settings, with `file` already resolved.
    pub logging: LoggingConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./coinbook.toml` if it exists in current directory
/// 2. `~/.config/coinbook/coinbook.toml` (XDG config directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("coinbook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("coinbook").join("coinbook.toml");
        if candidate.exists() {
            return candidate;
        }
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// Relative paths inside the file are resolved against its parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config = Config::load(&config_path)?;
        Self::resolve(config, config_path)
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// Without a file, paths resolve against the directory the config file
    /// would have lived in.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        Self::resolve(Config::default(), config_path)
    }

    fn resolve(config: Config, config_path: PathBuf) -> Result<Self> {
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        let keys_file = config.resolve_keys_file(&config_dir);
        let mut logging = config.logging;
        logging.file = logging.file.map(|file| resolve_against(&file, &config_dir));

        Ok(Self {
            config_path,
            keys_file,
            session: config.session,
            http: config.http,
            display: config.display,
            logging,
        })
    }

    /// Provider settings derived from this configuration.
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            session_timeout: self.session.timeout,
            http_timeout: self.http.timeout,
            ..ProviderOptions::default()
        }
    }
}
