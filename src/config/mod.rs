//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BidderConfig (validated, immutable)
//!     → lifecycle::startup builds routes, controllers, the router
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BidderConfig, EndpointsConfig, ExchangeConfig, FeaturesConfig, ListenerConfig,
    ObservabilityConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::ValidationError;
