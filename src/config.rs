//! Tracker configuration.
//!
//! Built once at startup (usually from the environment) and handed to the
//! tracker and adapters by value.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master switch. When false nothing is measured or stored.
    pub enabled: bool,

    /// Warm-up calls skipped per adapter before thresholds are evaluated.
    pub skip_requests: u64,

    /// A sample is kept only if its memory delta is strictly above this.
    pub memory_threshold_mb: f64,

    /// A sample is kept only if RSS before the call is strictly above this.
    pub ram_before_threshold_mb: f64,

    /// Bound on the ranked set, per namespace.
    pub max_stored_urls: usize,

    pub redis_url: String,

    /// Prefix for every store key, so several apps can share one Redis.
    pub key_prefix: String,

    /// Listen address for the bundled server binary.
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            skip_requests: 10,
            memory_threshold_mb: 1.0,
            ram_before_threshold_mb: 0.0,
            max_stored_urls: 20,
            redis_url: "redis://localhost:6379/0".to_string(),
            key_prefix: "memhealth".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MEM_HEALTH_ENABLED`: `"true"` turns tracking on
    /// - `MEM_HEALTH_SKIP_REQUESTS`: warm-up call count
    /// - `MEM_HEALTH_MEMORY_THRESHOLD_MB`: minimum memory delta
    /// - `MEM_HEALTH_RAM_BEFORE_THRESHOLD`: minimum RSS before the call
    /// - `MEM_HEALTH_MAX_STORED_URLS`: ranked set bound
    /// - `MEM_HEALTH_REDIS_KEY`: name of the variable holding the Redis URL
    ///   (default `REDIS_URL`)
    /// - `MEM_HEALTH_KEY_PREFIX`: store key prefix
    /// - `MEM_HEALTH_BIND`: server listen address
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(s) = lookup("MEM_HEALTH_ENABLED") {
            cfg.enabled = s.trim() == "true";
        }

        parse_into(&lookup, "MEM_HEALTH_SKIP_REQUESTS", &mut cfg.skip_requests);
        parse_into(
            &lookup,
            "MEM_HEALTH_MEMORY_THRESHOLD_MB",
            &mut cfg.memory_threshold_mb,
        );
        parse_into(
            &lookup,
            "MEM_HEALTH_RAM_BEFORE_THRESHOLD",
            &mut cfg.ram_before_threshold_mb,
        );
        parse_into(&lookup, "MEM_HEALTH_MAX_STORED_URLS", &mut cfg.max_stored_urls);

        let url_var = lookup("MEM_HEALTH_REDIS_KEY").unwrap_or_else(|| "REDIS_URL".to_string());
        if let Some(url) = lookup(&url_var) {
            cfg.redis_url = url;
        }

        if let Some(prefix) = lookup("MEM_HEALTH_KEY_PREFIX") {
            cfg.key_prefix = prefix;
        }
        if let Some(addr) = lookup("MEM_HEALTH_BIND") {
            cfg.bind_addr = addr;
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_stored_urls == 0 {
            return Err(Error::Config("max_stored_urls must be at least 1".into()));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(Error::Config("key_prefix must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = Config::from_lookup(|_| None);
        assert!(!cfg.enabled);
        assert_eq!(cfg.skip_requests, 10);
        assert_eq!(cfg.max_stored_urls, 20);
        assert_eq!(cfg.redis_url, "redis://localhost:6379/0");
        assert_eq!(cfg.key_prefix, "memhealth");
    }

    #[test]
    fn reads_values_and_indirect_redis_url() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("MEM_HEALTH_ENABLED", "true"),
            ("MEM_HEALTH_SKIP_REQUESTS", "3"),
            ("MEM_HEALTH_MEMORY_THRESHOLD_MB", "2.5"),
            ("MEM_HEALTH_RAM_BEFORE_THRESHOLD", "100"),
            ("MEM_HEALTH_MAX_STORED_URLS", "5"),
            ("MEM_HEALTH_REDIS_KEY", "CACHE_URL"),
            ("CACHE_URL", "redis://cache:6379/2"),
            ("REDIS_URL", "redis://ignored:6379/0"),
        ]));
        assert!(cfg.enabled);
        assert_eq!(cfg.skip_requests, 3);
        assert_eq!(cfg.memory_threshold_mb, 2.5);
        assert_eq!(cfg.ram_before_threshold_mb, 100.0);
        assert_eq!(cfg.max_stored_urls, 5);
        assert_eq!(cfg.redis_url, "redis://cache:6379/2");
    }

    #[test]
    fn bad_numbers_keep_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("MEM_HEALTH_SKIP_REQUESTS", "lots"),
            ("MEM_HEALTH_ENABLED", "yes"),
        ]));
        assert_eq!(cfg.skip_requests, 10);
        assert!(!cfg.enabled);
    }

    #[test]
    fn validate_rejects_zero_bound() {
        let cfg = Config {
            max_stored_urls: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        assert!(Config::default().validate().is_ok());
    }
}
