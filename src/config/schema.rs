//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Public listener configuration.
    pub listener: ListenerConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Priority scheduler settings.
    pub scheduler: SchedulerConfig,

    /// Response security headers and CORS.
    pub security: SecurityConfig,

    /// Static site served by the default handler.
    pub site: SiteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Management API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per client within one window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// How often stale client records are swept, in seconds (0 disables).
    pub sweep_interval_secs: u64,

    /// Trusted header carrying the client identity (e.g. "x-forwarded-for").
    /// When unset, the peer IP is used.
    pub client_header: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window_ms: 60_000,
            sweep_interval_secs: 60,
            client_header: None,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Deadline for a single handler invocation in milliseconds.
    /// `None` lets a handler run for as long as it likes.
    pub handler_timeout_ms: Option<u64>,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add Content-Security-Policy and Strict-Transport-Security headers.
    pub enable_headers: bool,

    /// Content-Security-Policy value.
    pub content_security_policy: String,

    /// HSTS max-age in seconds.
    pub hsts_max_age_secs: u64,

    /// Answer CORS preflight and add CORS headers.
    pub cors_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            content_security_policy: "default-src 'self'; script-src 'self'; style-src 'self'"
                .to_string(),
            hsts_max_age_secs: 31_536_000,
            cors_enabled: true,
        }
    }
}

/// Static site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Directory holding the site files.
    pub root_dir: String,

    /// URL prefix mapped onto `root_dir`.
    pub url_prefix: String,

    /// File served for `/`.
    pub index_file: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_dir: "public".to_string(),
            url_prefix: "/public/".to_string(),
            index_file: "index.html".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key that validation refuses when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
