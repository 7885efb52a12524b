//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Inbound listen port, as a numeric string
    pub port: String,

    /// Upstream backend URLs, in routing order
    pub backends: Vec<String>,

    /// How often each backend is checked
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub health_interval: Duration,

    /// Timeout for a single health check
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    /// Timeout for a single forward attempt
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long in-flight requests may drain on shutdown
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Largest request or upstream response body buffered, in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Load balancing algorithm name (case-insensitive)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// The address the proxy listens on (all interfaces).
    pub fn listen_addr(&self) -> Result<SocketAddr, ParseIntError> {
        let port: u16 = self.port.trim().parse()?;
        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// The resolved algorithm. Unrecognized names fall back to round-robin.
    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from_name(&self.algorithm).unwrap_or_default()
    }

    /// Whether the configured algorithm name is one we know.
    pub fn algorithm_recognized(&self) -> bool {
        Algorithm::from_name(&self.algorithm).is_some()
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether metrics endpoint is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind metrics server
    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,

    /// Path for metrics endpoint
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
            path: default_metrics_path(),
        }
    }
}

/// Load balancing algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl Algorithm {
    /// Resolve a configured name, ignoring case.
    ///
    /// Returns `None` for names that match neither algorithm.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "roundrobin" | "round_robin" | "round-robin" => Some(Algorithm::RoundRobin),
            "leastconnections" | "least_connections" | "least-connections" | "leastconn"
            | "least_conn" => Some(Algorithm::LeastConnections),
            _ => None,
        }
    }
}

// Default value functions
fn default_health_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_algorithm() -> String {
    "roundRobin".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_defaults() {
        let yaml = r#"
port: "8080"
backends:
  - http://localhost:5001
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, "8080");
        assert_eq!(config.backends, vec!["http://localhost:5001"]);
        assert_eq!(config.health_interval, Duration::from_secs(10));
        assert_eq!(config.health_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.algorithm(), Algorithm::RoundRobin);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_camel_case_keys() {
        let yaml = r#"
port: "9000"
backends: ["http://a:1", "http://b:2"]
healthInterval: 250ms
maxBodySize: 4096
algorithm: leastConn
logFormat: pretty
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.health_interval, Duration::from_millis(250));
        assert_eq!(config.max_body_size, 4096);
        assert_eq!(config.algorithm(), Algorithm::LeastConnections);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_algorithm_names() {
        for name in ["roundRobin", "round_robin", "ROUNDROBIN", "round-robin"] {
            assert_eq!(Algorithm::from_name(name), Some(Algorithm::RoundRobin), "{}", name);
        }
        for name in ["leastConnections", "least_conn", "LeastConn", "least-connections"] {
            assert_eq!(
                Algorithm::from_name(name),
                Some(Algorithm::LeastConnections),
                "{}",
                name
            );
        }
        assert_eq!(Algorithm::from_name("random"), None);
    }

    #[test]
    fn test_unrecognized_algorithm_falls_back() {
        let yaml = r#"
port: "8080"
backends: ["http://a:1"]
algorithm: weighted
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.algorithm_recognized());
        assert_eq!(config.algorithm(), Algorithm::RoundRobin);
    }

    #[test]
    fn test_listen_addr() {
        let yaml = "port: \"8080\"\nbackends: [\"http://a:1\"]\n";
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());

        config.port = "http".to_string();
        assert!(config.listen_addr().is_err());
    }

    #[test]
    fn test_missing_backends_is_parse_error() {
        let result: Result<Config, _> = serde_yaml::from_str("port: \"8080\"\n");
        assert!(result.is_err());
    }
}
