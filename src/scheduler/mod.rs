//! Priority scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! admitted request + x-priority
//!     → priority.rs (parse signal, default 5)
//!     → queue.rs (ordered by priority, then arrival)
//!     → dispatcher.rs (one request in service at a time)
//!     → handler.rs (downstream work, terminal response)
//! ```
//!
//! # Design Decisions
//! - Lower priority value is served sooner; ties are FIFO
//! - No preemption: an urgent arrival waits for the request in service
//! - No queue bound; the rate limiter is the only backpressure
//! - Handler failures end one request, never the loop

pub mod dispatcher;
pub mod handler;
pub mod priority;
pub mod queue;

pub use dispatcher::{Dispatcher, Scheduler, SchedulerStats};
pub use handler::{Handler, HandlerError, HandlerFuture};
pub use priority::{Priority, PRIORITY_HEADER};
pub use queue::{PendingSet, QueueEntry};
