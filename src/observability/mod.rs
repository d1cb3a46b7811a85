//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, receivers, interceptor chains produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (meters and timers)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → In-process readers (health endpoint, tests)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
