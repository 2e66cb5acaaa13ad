//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Role of this process (main, worker)
    pub role: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fleet".to_string(),
            role: "main".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FLEET_SERVICE_NAME`: Service name (default: fleet)
    /// - `FLEET_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FLEET_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `FLEET_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("FLEET_SERVICE_NAME").unwrap_or_else(|_| "fleet".to_string()),

            role: "main".to_string(),

            log_level: env::var("FLEET_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("FLEET_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("FLEET_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Create configuration for a process role.
    pub fn for_role(role: &str) -> Self {
        let mut config = Self::from_env();
        config.role = role.to_string();
        config
    }

    /// Service name qualified with the role.
    pub fn full_service_name(&self) -> String {
        format!("{}-{}", self.service_name, self.role)
    }
}
