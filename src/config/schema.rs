//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// Listener configuration (bind address, environment).
    pub listener: ListenerConfig,

    /// Per-client rate limiting.
    pub limiter: RateLimitConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Graceful shutdown deadlines.
    pub shutdown: ShutdownConfig,

    /// Token lifetimes.
    pub tokens: TokenConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Environment name reported by the healthcheck.
    pub environment: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Token refill rate per client.
    pub requests_per_second: f64,

    /// Bucket capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed to make cross-origin requests.
    pub trusted_origins: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests once draining starts.
    pub grace_secs: u64,

    /// Time allowed for background work after the HTTP drain; unset waits forever.
    pub pending_timeout_secs: Option<u64>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: 5,
            pending_timeout_secs: Some(30),
        }
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    pub authentication_ttl_secs: i64,
    pub activation_ttl_secs: i64,
}

impl TokenConfig {
    pub fn authentication_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.authentication_ttl_secs)
    }

    pub fn activation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.activation_ttl_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            authentication_ttl_secs: 3 * 24 * 60 * 60,
            activation_ttl_secs: 3 * 24 * 60 * 60,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ApiConfig = toml::from_str("").unwrap();
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.burst, 4);
        assert_eq!(config.shutdown.grace_secs, 5);
        assert_eq!(config.tokens.authentication_ttl_secs, 259_200);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ApiConfig = toml::from_str(
            r#"
            [limiter]
            enabled = false

            [cors]
            trusted_origins = ["http://localhost:3001"]
            "#,
        )
        .unwrap();
        assert!(!config.limiter.enabled);
        assert_eq!(config.limiter.requests_per_second, 2.0);
        assert_eq!(config.cors.trusted_origins, vec!["http://localhost:3001"]);
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }
}
