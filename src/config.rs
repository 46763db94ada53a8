//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_FEED_ADDR: &str = "127.0.0.1:7070";

/// Service configuration. CLI flags override individual fields after loading.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// SQLite database file (from ZONETRACK_DB_PATH). Platform data dir if unset.
    pub db_path: Option<PathBuf>,
    /// Position feed address (from ZONETRACK_FEED_ADDR)
    pub feed_addr: String,
    /// HTTP API port (from ZONETRACK_API_PORT)
    pub api_port: u16,
    /// Active object cache liveness window (from ZONETRACK_ACTIVE_TIMEOUT_SECS)
    pub active_timeout: Duration,
    /// Silence after which an object is marked gone (from ZONETRACK_GONE_AFTER_SECS)
    pub gone_after: Duration,
    /// Zone registry reload interval (from ZONETRACK_ZONE_RELOAD_SECS)
    pub zone_reload: Duration,
    /// Shard worker count (from ZONETRACK_WORKERS)
    pub workers: usize,
    /// Per-shard queue depth (from ZONETRACK_QUEUE_DEPTH)
    pub queue_depth: usize,
    /// Read zones from this JSON file instead of the database (from ZONETRACK_ZONES_FILE)
    pub zones_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            feed_addr: DEFAULT_FEED_ADDR.to_string(),
            api_port: DEFAULT_API_PORT,
            active_timeout: Duration::from_secs(5),
            gone_after: Duration::from_secs(60),
            zone_reload: Duration::from_secs(30),
            workers: 4,
            queue_depth: 1024,
            zones_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unparseable values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            db_path: lookup("ZONETRACK_DB_PATH").map(PathBuf::from),
            feed_addr: lookup("ZONETRACK_FEED_ADDR")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.feed_addr),
            api_port: parse_or(&lookup, "ZONETRACK_API_PORT", defaults.api_port),
            active_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ZONETRACK_ACTIVE_TIMEOUT_SECS",
                defaults.active_timeout.as_secs(),
            )),
            gone_after: Duration::from_secs(parse_or(
                &lookup,
                "ZONETRACK_GONE_AFTER_SECS",
                defaults.gone_after.as_secs(),
            )),
            zone_reload: Duration::from_secs(
                parse_or(&lookup, "ZONETRACK_ZONE_RELOAD_SECS", defaults.zone_reload.as_secs())
                    .max(1),
            ),
            workers: parse_or(&lookup, "ZONETRACK_WORKERS", defaults.workers).max(1),
            queue_depth: parse_or(&lookup, "ZONETRACK_QUEUE_DEPTH", defaults.queue_depth).max(1),
            zones_file: lookup("ZONETRACK_ZONES_FILE").map(PathBuf::from),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), Config::default());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = config_from(&[
            ("ZONETRACK_DB_PATH", "/tmp/zt.db"),
            ("ZONETRACK_FEED_ADDR", "10.0.0.5:9000"),
            ("ZONETRACK_API_PORT", "8080"),
            ("ZONETRACK_ACTIVE_TIMEOUT_SECS", "10"),
            ("ZONETRACK_GONE_AFTER_SECS", "120"),
            ("ZONETRACK_ZONE_RELOAD_SECS", "15"),
            ("ZONETRACK_WORKERS", "8"),
            ("ZONETRACK_QUEUE_DEPTH", "64"),
            ("ZONETRACK_ZONES_FILE", "zones.json"),
        ]);

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/zt.db")));
        assert_eq!(config.feed_addr, "10.0.0.5:9000");
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.active_timeout, Duration::from_secs(10));
        assert_eq!(config.gone_after, Duration::from_secs(120));
        assert_eq!(config.zone_reload, Duration::from_secs(15));
        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_depth, 64);
        assert_eq!(config.zones_file, Some(PathBuf::from("zones.json")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("ZONETRACK_API_PORT", "not-a-port"),
            ("ZONETRACK_ACTIVE_TIMEOUT_SECS", "-3"),
            ("ZONETRACK_WORKERS", "0"),
        ]);

        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert_eq!(config.active_timeout, Duration::from_secs(5));
        assert_eq!(config.workers, 1);
    }
}
