//! Server configuration from environment variables.

use std::str::FromStr;

use tracing::warn;

use crate::queue::{QueueSettings, MAX_BATCH_SIZE, MAX_PAYLOAD_SIZE, MAX_QUEUE_LEN};

pub const DEFAULT_TCP_PORT: u16 = 6789;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Listen on this Unix socket instead of TCP
    pub unix_socket: Option<String>,
    pub log_format: LogFormat,
    pub queue: QueueSettings,
}

impl Config {
    /// Read `PORT`, `UNIX_SOCKET`, `LOG_FORMAT` and the queue limits.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = QueueSettings::default();
        let queue = QueueSettings {
            visibility_timeout_ms: parse_or(&lookup, "VISIBILITY_TIMEOUT_MS", defaults.visibility_timeout_ms),
            sweep_interval_ms: parse_or(&lookup, "SWEEP_INTERVAL_MS", defaults.sweep_interval_ms).max(1),
            max_deliveries: parse_or(&lookup, "MAX_DELIVERIES", defaults.max_deliveries),
            max_queue_len: parse_or(&lookup, "MAX_QUEUE_LEN", MAX_QUEUE_LEN),
            max_batch_size: parse_or(&lookup, "MAX_BATCH_SIZE", MAX_BATCH_SIZE),
            max_payload_size: parse_or(&lookup, "MAX_PAYLOAD_SIZE", MAX_PAYLOAD_SIZE),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Self {
            port: parse_or(&lookup, "PORT", DEFAULT_TCP_PORT),
            unix_socket: lookup("UNIX_SOCKET").filter(|p| !p.is_empty()),
            log_format,
            queue,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Parse `key` or fall back to `default`. Garbage is reported, not fatal.
fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring invalid config value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 6789);
        assert!(config.unix_socket.is_none());
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.queue.visibility_timeout_ms, 30_000);
        assert_eq!(config.queue.sweep_interval_ms, 500);
        assert_eq!(config.queue.max_deliveries, 0);
        assert_eq!(config.queue.max_queue_len, 1_000_000);
        assert_eq!(config.queue.max_batch_size, 1000);
        assert_eq!(config.queue.max_payload_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "7000"),
            ("UNIX_SOCKET", "/tmp/rq.sock"),
            ("LOG_FORMAT", "JSON"),
            ("VISIBILITY_TIMEOUT_MS", "1500"),
            ("MAX_DELIVERIES", "5"),
        ]);
        assert_eq!(config.port, 7000);
        assert_eq!(config.unix_socket.as_deref(), Some("/tmp/rq.sock"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.queue.visibility_timeout_ms, 1500);
        assert_eq!(config.queue.max_deliveries, 5);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[("PORT", "not-a-port"), ("SWEEP_INTERVAL_MS", "0"), ("UNIX_SOCKET", "")]);
        assert_eq!(config.port, DEFAULT_TCP_PORT);
        assert_eq!(config.queue.sweep_interval_ms, 1);
        assert!(config.unix_socket.is_none());
    }
}
