//! Interceptor chain execution engine.
//!
//! # Data Flow
//! ```text
//! RequestReceiver
//!     → controller.rs (checks it is running, builds a chain)
//!     → chain.rs (proceed() drives each interceptor in order)
//!         → interceptor.execute(chain)
//!             → chain.proceed() → next interceptor ...
//!         → composite.rs (private sub-chain, then parent continues)
//!     → ChainResult back to the receiver (Ok / Abort / other error)
//! ```
//!
//! # Design Decisions
//! - Interceptor lists are fixed at construction and shared read-only
//! - Chains are per-request and borrow the request/response pair
//! - Abort is an error variant propagated with `?`, not unwinding
//! - One timer per interceptor implementation, inclusive of nested calls

pub mod chain;
pub mod composite;
pub mod controller;
pub mod error;
pub mod user;

pub use chain::{FnInterceptor, Interceptor, InterceptorChain};
pub use composite::CompositeInterceptor;
pub use controller::{ControllerState, InterceptorController};
pub use error::{BoxError, ChainResult, InterceptorError, LifecycleError};
pub use user::{Exchange, OnExchange, UserRequest, UserResponse};
