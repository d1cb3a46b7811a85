//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     BidderConfig → controllers → receivers → routes → Router
//!     → start controllers → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → drain in-flight requests → stop controllers
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then controllers, then listeners
//! - Ordered shutdown: stop accept, drain, stop controllers in reverse

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Bidder, Interceptors, OpenRtbCodec, Service, StartupError};
