//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → handed to the server, limiter and scheduler at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, override_bind_address, ConfigError};
pub use schema::{
    AdminConfig, GateConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    SchedulerConfig, SecurityConfig, SiteConfig,
};
