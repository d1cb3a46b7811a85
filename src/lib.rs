//! Real-time bidding core: routing, transport-neutral HTTP messages, and
//! interceptor chains that business policies plug into.

pub mod config;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod observability;
pub mod receiver;
pub mod routing;

pub use config::BidderConfig;
pub use lifecycle::{Bidder, Interceptors, Shutdown};
pub use routing::Router;
