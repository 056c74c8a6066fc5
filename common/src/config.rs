//! Service configuration.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file in the working directory.

use std::str::FromStr;

/// Log output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Runtime configuration shared by the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs and health responses.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Timeout applied when opening a backend connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum pool size for relational backends.
    pub max_connections: u32,
    /// Log output format.
    pub log_format: LogFormat,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "admin-gateway".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.host),
            port: parse_or(&lookup, "SERVER_PORT", defaults.port),
            connect_timeout_secs: parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections),
            log_format: parse_or(&lookup, "LOG_FORMAT", defaults.log_format),
        }
    }

    /// Address to bind the HTTP listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid configuration value, using default");
                default
            }
        },
        None => default,
    }
}

/// Loads a `.env` file from the working directory (best-effort, no error if missing).
///
/// Variables already present in the environment win.
pub fn load_dotenv() {
    let env_path = std::path::Path::new(".env");
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
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
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup("svc", |_| None);
        assert_eq!(config.service_name, "svc");
        assert_eq!(config.port, 5000);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = AppConfig::from_lookup(
            "svc",
            lookup_from(&[
                ("SERVER_HOST", "127.0.0.1"),
                ("SERVER_PORT", "8088"),
                ("DB_MAX_CONNECTIONS", "12"),
                ("LOG_FORMAT", "JSON"),
            ]),
        );
        assert_eq!(config.bind_addr(), "127.0.0.1:8088");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(
            "svc",
            lookup_from(&[("SERVER_PORT", "not-a-port"), ("LOG_FORMAT", "xml")]),
        );
        assert_eq!(config.port, 5000);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_parse_dotenv_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv("# comment\n\nSERVER_PORT=9000\nLOG_FORMAT=\"json\"\nbroken line\n");
        assert_eq!(
            parsed,
            vec![
                ("SERVER_PORT".to_string(), "9000".to_string()),
                ("LOG_FORMAT".to_string(), "json".to_string()),
            ]
        );
    }
}
