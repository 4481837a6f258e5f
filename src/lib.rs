//! Priority gate: per-client rate limiting in front of a single-flight,
//! priority-ordered dispatcher that protects one downstream handler.

pub mod admin;
pub mod config;
pub mod content;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod scheduler;
pub mod security;

pub use config::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use scheduler::{Handler, HandlerError, Priority, Scheduler};
pub use security::RateLimiter;
