//! Process Configuration
//!
//! All tunables are read once at startup from environment variables and then
//! passed into components by value; nothing in the crate reads the
//! environment after construction.

use std::time::Duration;

/// Crate-wide configuration knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum key size in bytes (after trimming).
    pub max_key_bytes: usize,
    /// Maximum value size in bytes.
    pub max_value_bytes: usize,
    /// TTL advertised to clients when they do not supply one. Never applied
    /// implicitly: a create without a TTL produces a record with no expiry.
    pub default_ttl_seconds: u64,
    /// Interval between reconciliation sweeps.
    pub sweep_interval: Duration,
    /// Maximum number of items in one batch create.
    pub max_batch_size: usize,
    /// Maximum number of tags per record.
    pub max_tags: usize,
    /// Maximum length of a tag key or value, in characters.
    pub max_tag_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_key_bytes: 256,
            max_value_bytes: 2 * 1024 * 1024,
            default_ttl_seconds: 3600,
            sweep_interval: Duration::from_secs(200),
            max_batch_size: 100,
            max_tags: 50,
            max_tag_len: 100,
        }
    }
}

impl Config {
    /// Builds a configuration from `TENANTKV_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            max_key_bytes: env_parse("TENANTKV_MAX_KEY_BYTES", defaults.max_key_bytes),
            max_value_bytes: env_parse("TENANTKV_MAX_VALUE_BYTES", defaults.max_value_bytes),
            default_ttl_seconds: env_parse("TENANTKV_DEFAULT_TTL_SECONDS", defaults.default_ttl_seconds),
            sweep_interval: Duration::from_secs(env_parse(
                "TENANTKV_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval.as_secs(),
            )),
            max_batch_size: env_parse("TENANTKV_MAX_BATCH_SIZE", defaults.max_batch_size),
            max_tags: env_parse("TENANTKV_MAX_TAGS", defaults.max_tags),
            max_tag_len: env_parse("TENANTKV_MAX_TAG_LEN", defaults.max_tag_len),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
