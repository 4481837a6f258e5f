//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CORS preflight answered here)
//!     → rate_limit.rs (per-client fixed window)
//!     → Admitted to the scheduler
//! Outgoing response:
//!     → headers.rs (CSP, HSTS, CORS headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an over-limit request never reaches the scheduler
//! - No trust in client input unless a header is explicitly trusted

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{Decision, RateLimitState, RateLimiter};
