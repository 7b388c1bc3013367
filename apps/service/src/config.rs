use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::{BusConfig, RedeliveryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("No config path available: neither XDG_CONFIG_HOME nor a home directory is set")]
    ConfigPathUnavailable,

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub database: DatabaseSettings,
    pub monitoring: Monitoring,
    pub bus: Bus,
    /// Sites registered at startup if their URL is not known yet
    pub sites: Vec<SeedSite>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub sweep_interval_seconds: u64,
    pub probe_timeout_seconds: u64,
    pub sweep_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bus {
    pub queue_capacity: usize,
    pub max_delivery_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSite {
    pub url: String,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "uptime.db".into(), max_connections: 16 }
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self { sweep_interval_seconds: 3600, probe_timeout_seconds: 10, sweep_on_start: false }
    }
}

impl Default for Bus {
    fn default() -> Self {
        let policy = RedeliveryPolicy::default();
        Self {
            queue_capacity: BusConfig::default().queue_capacity,
            max_delivery_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

/// Longest accepted sweep period (30 days)
pub const MAX_SWEEP_INTERVAL_SECONDS: u64 = 30 * 24 * 60 * 60;

impl Monitoring {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl Bus {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            queue_capacity: self.queue_capacity,
            redelivery: RedeliveryPolicy {
                max_attempts: self.max_delivery_attempts,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
            },
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptime/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uptime/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Max Connections", &self.database.max_connections)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Sweep Interval (s)", &self.monitoring.sweep_interval_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitoring.probe_timeout_seconds)?;
        write_1(f, "Sweep On Start", &self.monitoring.sweep_on_start)?;
        write_title_1(f, "Transition Bus")?;
        write_1(f, "Queue Capacity", &self.bus.queue_capacity)?;
        write_1(f, "Max Delivery Attempts", &self.bus.max_delivery_attempts)?;
        write_1(f, "Backoff (ms)", &format!("{}..{}", self.bus.initial_backoff_ms, self.bus.max_backoff_ms))?;
        write_title_1(f, "Seed Sites")?;
        write_1(f, "Count", &self.sites.len())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptime/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.monitoring.sweep_interval_seconds == 0 {
            return invalid("monitoring.sweep_interval_seconds must be greater than zero");
        }
        if self.monitoring.sweep_interval_seconds > MAX_SWEEP_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "monitoring.sweep_interval_seconds must not exceed {MAX_SWEEP_INTERVAL_SECONDS}"
            )));
        }
        if self.monitoring.probe_timeout_seconds == 0 {
            return invalid("monitoring.probe_timeout_seconds must be greater than zero");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be greater than zero");
        }
        if self.bus.queue_capacity == 0 {
            return invalid("bus.queue_capacity must be greater than zero");
        }
        if self.bus.max_delivery_attempts == 0 {
            return invalid("bus.max_delivery_attempts must be greater than zero");
        }
        if self.bus.initial_backoff_ms > self.bus.max_backoff_ms {
            return invalid("bus.initial_backoff_ms must not exceed bus.max_backoff_ms");
        }
        if let Some(site) = self.sites.iter().find(|s| s.url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("seed site has an empty url: {site:?}")));
        }
        Ok(())
    }
}
