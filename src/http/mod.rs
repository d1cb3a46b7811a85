//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body collection)
//!     → request.rs (HttpRequestBuilder → immutable HttpRequest)
//!     → receiver.rs (ReceiverContext handed to the bid router)
//!     → response.rs (HttpResponseBuilder → HttpResponse)
//!     → server.rs renders status, headers, Set-Cookie, body
//! ```
//!
//! # Design Decisions
//! - Messages are transport-neutral; only server.rs knows about Axum
//! - Bodies live in a content.rs holder that enforces single, typed access
//! - Builders own all mutable state; `build()` snapshots it

pub mod content;
pub mod cookie;
pub mod message;
pub mod receiver;
pub mod request;
pub mod response;
pub mod server;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

pub use content::{Charset, ContentError, ContentHolder, ContentState};
pub use cookie::Cookie;
pub use message::{HttpError, Multimap};
pub use receiver::{HttpReceiver, ReceiverContext};
pub use request::{HttpRequest, HttpRequestBuilder};
pub use response::{HttpResponse, HttpResponseBuilder};
pub use server::HttpServer;
