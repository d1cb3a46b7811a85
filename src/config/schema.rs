//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML; every field
//! has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::routing::feature::{Feature, FeatureSet};

/// Root configuration for the bidder.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BidderConfig {
    pub listener: ListenerConfig,

    /// Capabilities this deployment serves.
    pub features: FeaturesConfig,

    pub exchange: ExchangeConfig,

    /// Path specs for the built-in endpoints.
    pub endpoints: EndpointsConfig,

    pub timeouts: TimeoutConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Enabled capability names; unknown names are custom features.
    pub enabled: Vec<Feature>,
}

impl FeaturesConfig {
    pub fn feature_set(&self) -> FeatureSet {
        self.enabled.iter().cloned().collect()
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                Feature::BID,
                Feature::IMPRESSION,
                Feature::CLICK,
                Feature::MATCH,
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Exchange identity used in metric names and interceptor filtering.
    pub name: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: "openrtb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub bid: String,
    pub impression: String,
    pub click: String,
    /// Cookie-matching endpoint.
    #[serde(rename = "match")]
    pub user_match: String,
    pub health: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            bid: "/bid".to_string(),
            impression: "/impression".to_string(),
            click: "/click".to_string(),
            user_match: "/match".to_string(),
            health: "/health".to_string(),
        }
    }
}

impl EndpointsConfig {
    /// `(field, spec)` pairs, for validation and logging.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("endpoints.bid", &self.bid),
            ("endpoints.impression", &self.impression),
            ("endpoints.click", &self.click),
            ("endpoints.match", &self.user_match),
            ("endpoints.health", &self.health),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole request, enforced by the transport.
    pub request_ms: u64,

    /// Grace period for in-flight requests on shutdown.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 120,
            shutdown_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
