//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Validate the configuration.
///
/// Checks for:
/// - A numeric, non-zero listen port
/// - At least one backend, each an absolute `http` URL with a host
/// - No duplicate backends
/// - Non-zero health interval, health timeout, and request timeout
/// - A non-zero body size limit
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    match config.port.trim().parse::<u16>() {
        Ok(0) => errors.push("port must be non-zero".to_string()),
        Ok(_) => {}
        Err(_) => errors.push(format!("port '{}' is not numeric", config.port)),
    }

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for raw in &config.backends {
        match Url::parse(raw) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(format!(
                        "backend '{}' has unsupported scheme '{}' (expected http)",
                        raw,
                        url.scheme()
                    ));
                }
                if url.host_str().is_none() {
                    errors.push(format!("backend '{}' has no host", raw));
                }
                if !seen.insert(url) {
                    errors.push(format!("duplicate backend: {}", raw));
                }
            }
            Err(e) => errors.push(format!("backend '{}' is not a valid URL: {}", raw, e)),
        }
    }

    let durations = [
        ("healthInterval", config.health_interval),
        ("healthTimeout", config.health_timeout),
        ("requestTimeout", config.request_timeout),
    ];
    for (name, value) in durations {
        if value == Duration::ZERO {
            errors.push(format!("{} must be greater than zero", name));
        }
    }

    if config.max_body_size == 0 {
        errors.push("maxBodySize must be greater than zero".to_string());
    }

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
