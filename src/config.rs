//! Configuration Module
//!
//! Engine configuration plus the server settings loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::NormalizationMode;
use crate::error::{CacheError, Result};

/// Fixed TTL applied when a caller does not pick one: one day.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Default maximum number of live entries.
pub const DEFAULT_CAPACITY: usize = 1000;

// == Cache Config ==
/// Settings for a single cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub capacity: usize,
    /// TTL used by `put_default`
    pub default_ttl: Duration,
    /// Normalization steps applied to prompts
    pub normalization: NormalizationMode,
    /// Attach new prompts to an existing entry holding the same payload
    pub deduplicate_payloads: bool,
}

impl CacheConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Rejects configurations that cannot hold a single fresh entry.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::CapacityMisconfigured(0));
        }
        if self.default_ttl < Duration::from_millis(1) {
            return Err(CacheError::InvalidConfig(
                "default TTL must be at least one millisecond".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            normalization: NormalizationMode::all(),
            deduplicate_payloads: true,
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum live entries (default: 1000, must be > 0)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 86400)
    /// - `NORMALIZATION` - e.g. `case_fold,whitespace_collapse,unicode_form` or `none` (default: all)
    /// - `DEDUPLICATE_PAYLOADS` - `true`/`false` (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep interval in seconds (default: 0, lazy expiry only)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let capacity = match lookup("CACHE_CAPACITY") {
            Some(raw) => {
                let value: i64 = parse_var("CACHE_CAPACITY", &raw)?;
                if value <= 0 {
                    return Err(CacheError::CapacityMisconfigured(value));
                }
                usize::try_from(value).map_err(|_| {
                    CacheError::InvalidConfig(format!("CACHE_CAPACITY out of range: {}", value))
                })?
            }
            None => defaults.cache.capacity,
        };

        let default_ttl = match lookup("DEFAULT_TTL") {
            Some(raw) => Duration::from_secs(parse_var("DEFAULT_TTL", &raw)?),
            None => defaults.cache.default_ttl,
        };

        let normalization = match lookup("NORMALIZATION") {
            Some(raw) => NormalizationMode::parse_list(&raw)?,
            None => defaults.cache.normalization,
        };

        let deduplicate_payloads = match lookup("DEDUPLICATE_PAYLOADS") {
            Some(raw) => parse_var("DEDUPLICATE_PAYLOADS", &raw)?,
            None => defaults.cache.deduplicate_payloads,
        };

        let server_port = match lookup("SERVER_PORT") {
            Some(raw) => parse_var("SERVER_PORT", &raw)?,
            None => defaults.server_port,
        };

        let sweep_interval = match lookup("SWEEP_INTERVAL") {
            Some(raw) => parse_var("SWEEP_INTERVAL", &raw)?,
            None => defaults.sweep_interval,
        };

        let cache = CacheConfig {
            capacity,
            default_ttl,
            normalization,
            deduplicate_payloads,
        };
        cache.validate()?;

        Ok(Self {
            cache,
            server_port,
            sweep_interval,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            sweep_interval: 0,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::InvalidConfig(format!("{} has invalid value '{}'", name, raw)))
}
