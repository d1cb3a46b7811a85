//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Route[] (name, methods, path spec, receiver, required features)
//!     → drop routes whose features are not enabled
//!     → synthesize an OPTIONS entry per matcher
//!     → reject duplicate (matcher, method) pairs
//!     → Freeze as immutable Router
//!
//! Incoming Request:
//!     → router.rs (path check, then matchers in precedence order)
//!     → matcher.rs (root < default < exact < prefix < suffix)
//!     → matched Route's receiver, or fallback.rs (404 / 405 / OPTIONS)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix and suffix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins, independent of registration order

pub mod fallback;
pub mod feature;
pub mod matcher;
pub mod route;
pub mod router;

pub use fallback::AllowedMethods;
pub use feature::{Feature, FeatureSet};
pub use matcher::{MatchType, PathMatcher};
pub use route::Route;
pub use router::{RouteError, Router, RouterBuilder};
