//! TOML-based configuration for the shell server.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working server on `127.0.0.1:31337`:
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 31337
//!
//! [shell]
//! debug = false
//! evaluator = "calc"        # or "echo"
//! max_line_bytes = 1048576
//! fetch_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so a file only needs to name the
//! values it changes.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backdoros_core::{EvaluatorKind, DEFAULT_MAX_LINE_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::session::ShellSettings;

/// Default TCP port of the shell.
pub const DEFAULT_PORT: u16 = 31337;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `server.bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    /// `shell.evaluator` names no known evaluator.
    #[error("invalid evaluator: {0}")]
    InvalidEvaluator(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind.  `"0.0.0.0"` exposes the shell on every interface.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    /// Initial value of the process-wide `DEBUG` flag.
    #[serde(default)]
    pub debug: bool,
    /// Evaluator used by `REPL`: `"calc"` or `"echo"`.
    #[serde(default = "default_evaluator")]
    pub evaluator: String,
    /// Longest accepted input line, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Connect and total timeout for `WRITE <url>` downloads.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default value functions ───────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_evaluator() -> String {
    EvaluatorKind::default().to_string()
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            debug: false,
            evaluator: default_evaluator(),
            max_line_bytes: default_max_line_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl AppConfig {
    /// The socket address the listener binds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not
    /// an IPv4 or IPv6 literal.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Session settings for the application layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEvaluator`] for an unknown evaluator name.
    pub fn shell_settings(&self) -> Result<ShellSettings, ConfigError> {
        let evaluator = self
            .shell
            .evaluator
            .parse::<EvaluatorKind>()
            .map_err(ConfigError::InvalidEvaluator)?;
        Ok(ShellSettings {
            debug: self.shell.debug,
            evaluator,
            max_line_bytes: self.shell.max_line_bytes,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.shell.fetch_timeout_secs)
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(text: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Loads the configuration file at `path`, or the defaults when no path is
/// given or the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
