// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are read from an optional `config/default.toml` and then overlaid
//! with `TRIPTRACK__`-prefixed environment variables, e.g.
//! `TRIPTRACK__STORAGE__RETENTION_SECS=3600`.
use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up by [`Settings::load`]
pub const DEFAULT_CONFIG_FILE: &str = "config/default";
/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRIPTRACK";
/// Samples live for 7 days
pub const DEFAULT_RETENTION_SECS: u64 = 60 * 60 * 24 * 7;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP/WebSocket listener
    pub server: ServerSettings,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Location store
    pub storage: StorageSettings,
    /// Bearer token verification
    pub auth: AuthSettings,
    /// Room relay
    pub relay: RelaySettings,
    /// Booking directory seed
    pub bookings: BookingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
}

/// Which location store engine to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory of the flat-file engine
    pub path: PathBuf,
    /// Samples older than this are expired
    pub retention_secs: u64,
    /// How often the expiry sweeper runs
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 secret shared with the token issuer
    pub jwt_secret: String,
    /// Lifetime of tokens minted by `issue-token`
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Frames queued per connection before new ones are dropped
    pub outbound_buffer: usize,
    /// Refuse WebSocket upgrades without a valid bearer token
    pub require_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    /// JSON file with the bookings known to this instance
    pub path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            log_level: "info".to_string(),
            storage: StorageSettings::default(),
            auth: AuthSettings::default(),
            relay: RelaySettings::default(),
            bookings: BookingSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("data"),
            retention_secs: DEFAULT_RETENTION_SECS,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            token_ttl_secs: 60 * 60 * 24 * 7,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
            require_token: true,
        }
    }
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/bookings.json"),
        }
    }
}

impl Settings {
    /// Load settings from `config/default.*` (optional) and the environment
    pub fn load() -> Result<Self> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load settings from an explicit file (required) and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.storage.retention_secs == 0 {
            bail!("storage.retention_secs must be greater than zero");
        }
        if self.storage.sweep_interval_secs == 0 {
            bail!("storage.sweep_interval_secs must be greater than zero");
        }
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if self.relay.outbound_buffer == 0 {
            bail!("relay.outbound_buffer must be greater than zero");
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.storage.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.storage.sweep_interval_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_secs)
    }
}
