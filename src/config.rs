//! Server Configuration
//!
//! Everything is read from `KEZE_*` environment variables (a `.env` file is
//! loaded first by the binary). Unset variables fall back to defaults;
//! set-but-unparseable ones are an error rather than silently ignored.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::DEFAULT_STORE_TIMEOUT;
use crate::game::rules::EconomyRules;
use crate::network::auth::AuthConfig;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variable present but not parseable.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Close connections silent for this long.
    pub idle_timeout: Duration,
    /// Bound on store calls and player lock waits.
    pub store_timeout: Duration,
    /// Ledger snapshot location; `None` keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
    /// Fixed RNG seed for reproducible runs; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Server version string.
    pub version: String,
    /// Economy tunables.
    pub rules: EconomyRules,
    /// Token verification.
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            snapshot_path: None,
            rng_seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            rules: EconomyRules::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.auth = AuthConfig::from_env();
        Ok(config)
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();
        let base = EconomyRules::default();

        let rules = EconomyRules {
            min_action_interval: env
                .parse::<u64>("KEZE_MIN_TAP_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(base.min_action_interval),
            max_taps_per_request: env
                .parse("KEZE_MAX_TAPS_PER_REQUEST")?
                .unwrap_or(base.max_taps_per_request),
            energy_regen_per_minute: env
                .parse("KEZE_ENERGY_REGEN_PER_MINUTE")?
                .unwrap_or(base.energy_regen_per_minute),
            min_stake: env.parse("KEZE_MIN_STAKE")?.unwrap_or(base.min_stake),
            referral_bonus: env.parse("KEZE_REFERRAL_BONUS")?.unwrap_or(base.referral_bonus),
            welcome_bonus: env.parse("KEZE_WELCOME_BONUS")?.unwrap_or(base.welcome_bonus),
            ..base
        };

        Ok(Self {
            bind_addr: env.parse("KEZE_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            max_connections: env
                .parse("KEZE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            idle_timeout: env
                .parse::<u64>("KEZE_IDLE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            store_timeout: env
                .parse::<u64>("KEZE_STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            snapshot_path: env.get("KEZE_SNAPSHOT_PATH").map(PathBuf::from),
            rng_seed: env.parse("KEZE_RNG_SEED")?,
            rules,
            ..defaults
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
