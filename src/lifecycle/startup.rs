//! Startup orchestration.
//!
//! # Responsibilities
//! - Compose controllers, receivers, and routes from configuration
//! - Start every installed controller before traffic is accepted
//! - Bind the listener and serve until shutdown
//! - Stop controllers in reverse order afterwards
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Controllers start in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;

use crate::config::{BidderConfig, ConfigError};
use crate::http::receiver::HttpReceiver;
use crate::http::server::HttpServer;
use crate::interceptor::{Exchange, Interceptor, LifecycleError};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics::MetricRegistry;
use crate::receiver::bid::{BidController, BidRequest, BidResponse};
use crate::receiver::click::{ClickController, ClickRequest, ClickResponse};
use crate::receiver::impression::{ImpressionController, ImpressionRequest, ImpressionResponse};
use crate::receiver::r#match::{MatchController, MatchRequest, MatchResponse};
use crate::receiver::{
    BidRequestReceiver, ClickRequestReceiver, HealthReceiver, ImpressionRequestReceiver, JsonCodec,
    MatchRequestReceiver,
};
use crate::routing::{Feature, Route, RouteError, Router};

/// Anything with a start/stop lifecycle managed by the bidder.
pub trait Service: Send + Sync {
    fn service_name(&self) -> &str;

    fn start(&self) -> Result<(), LifecycleError>;

    fn stop(&self);

    fn is_running(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid route table: {0}")]
    Route(#[from] RouteError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("invalid listener address `{address}`")]
    Address { address: String },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Untyped OpenRTB JSON, the built-in bid wire format.
pub type OpenRtbCodec = JsonCodec<Value, Value>;

pub type BidInterceptor = Arc<dyn Interceptor<BidRequest<OpenRtbCodec>, BidResponse<OpenRtbCodec>>>;
pub type ImpressionInterceptor = Arc<dyn Interceptor<ImpressionRequest, ImpressionResponse>>;
pub type ClickInterceptor = Arc<dyn Interceptor<ClickRequest, ClickResponse>>;
pub type MatchInterceptor = Arc<dyn Interceptor<MatchRequest, MatchResponse>>;

/// Business policies plugged into each endpoint, in execution order.
#[derive(Default)]
pub struct Interceptors {
    pub bid: Vec<BidInterceptor>,
    pub impression: Vec<ImpressionInterceptor>,
    pub click: Vec<ClickInterceptor>,
    pub user_match: Vec<MatchInterceptor>,
}

/// The composed bidder: router plus the controllers behind it.
pub struct Bidder {
    config: BidderConfig,
    registry: Arc<MetricRegistry>,
    router: Arc<Router>,
    services: Vec<Arc<dyn Service>>,
}

impl Bidder {
    /// Wire controllers, receivers, and routes. Only controllers whose route
    /// is installed are managed.
    pub fn build(config: BidderConfig, interceptors: Interceptors) -> Result<Self, StartupError> {
        let registry = Arc::new(MetricRegistry::new());
        let exchange = Exchange::new(config.exchange.name.clone());
        let features = config.features.feature_set();
        let endpoints = &config.endpoints;

        let bid = Arc::new(BidController::<OpenRtbCodec>::new(
            "bid",
            interceptors.bid,
            &registry,
        ));
        let impression = Arc::new(ImpressionController::new(
            "impression",
            interceptors.impression,
            &registry,
        ));
        let click = Arc::new(ClickController::new("click", interceptors.click, &registry));
        let user_match = Arc::new(MatchController::new(
            "match",
            interceptors.user_match,
            &registry,
        ));

        let bid_receiver: Arc<dyn HttpReceiver> = Arc::new(BidRequestReceiver::new(
            exchange.clone(),
            Arc::clone(&registry),
            Arc::clone(&bid),
            OpenRtbCodec::openrtb(),
        ));
        let impression_receiver: Arc<dyn HttpReceiver> = Arc::new(ImpressionRequestReceiver::new(
            exchange.clone(),
            Arc::clone(&registry),
            Arc::clone(&impression),
        ));
        let click_receiver: Arc<dyn HttpReceiver> = Arc::new(ClickRequestReceiver::new(
            exchange.clone(),
            Arc::clone(&registry),
            Arc::clone(&click),
        ));
        let match_receiver: Arc<dyn HttpReceiver> = Arc::new(MatchRequestReceiver::new(
            exchange,
            Arc::clone(&registry),
            Arc::clone(&user_match),
        ));

        let candidates: Vec<(Route, Arc<dyn Service>)> = vec![
            (
                Route::post("bid", endpoints.bid.as_str(), bid_receiver, [Feature::BID]),
                bid as Arc<dyn Service>,
            ),
            (
                Route::get(
                    "impression",
                    endpoints.impression.as_str(),
                    impression_receiver,
                    [Feature::IMPRESSION],
                ),
                impression as Arc<dyn Service>,
            ),
            (
                Route::get("click", endpoints.click.as_str(), click_receiver, [Feature::CLICK]),
                click as Arc<dyn Service>,
            ),
            (
                Route::get(
                    "match",
                    endpoints.user_match.as_str(),
                    match_receiver,
                    [Feature::MATCH],
                ),
                user_match as Arc<dyn Service>,
            ),
        ];

        let mut routes = Vec::with_capacity(candidates.len() + 1);
        let mut services = Vec::new();
        for (route, service) in candidates {
            if route.has_required_features(&features) {
                services.push(service);
            }
            routes.push(route);
        }

        let health: Arc<dyn HttpReceiver> = Arc::new(HealthReceiver::new(services.clone()));
        routes.push(Route::get("health", endpoints.health.as_str(), health, []));

        let router = Router::builder()
            .routes(routes)
            .enabled_features(features)
            .metrics(Arc::clone(&registry))
            .build()?;

        Ok(Self {
            config,
            registry,
            router: Arc::new(router),
            services,
        })
    }

    pub fn config(&self) -> &BidderConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    /// Start every service in order. On failure, services already started are
    /// stopped again in reverse order.
    pub fn start(&self) -> Result<(), StartupError> {
        for (started, service) in self.services.iter().enumerate() {
            if let Err(e) = service.start() {
                tracing::error!(service = %service.service_name(), error = %e, "Service failed to start");
                for service in self.services[..started].iter().rev() {
                    service.stop();
                }
                return Err(e.into());
            }
        }
        tracing::info!(services = self.services.len(), "All services started");
        Ok(())
    }

    /// Stop every service in reverse start order.
    pub fn stop(&self) {
        for service in self.services.iter().rev() {
            service.stop();
        }
    }

    /// Bind the configured listener, start services, serve until `shutdown`.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), StartupError> {
        let address: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|_| StartupError::Address {
                address: self.config.listener.bind_address.clone(),
            })?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        self.serve(listener, shutdown).await
    }

    /// Start services and serve on an already bound listener until `shutdown`.
    pub async fn serve(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), StartupError> {
        self.start()?;

        let server = HttpServer::new(Arc::clone(&self.router), &self.config);
        let grace = self.shutdown_grace();
        let signalled = shutdown.signalled();
        let deadline = async move {
            signalled.await;
            tokio::time::sleep(grace).await;
        };
        let served = tokio::select! {
            result = server.run(listener, shutdown.signalled()) => result,
            () = deadline => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Shutdown grace period elapsed, dropping connections"
                );
                Ok(())
            }
        };

        tracing::info!("Stopping services");
        self.stop();
        served.map_err(StartupError::Serve)
    }

    /// Grace period for in-flight requests after shutdown is triggered.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.shutdown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    use crate::interceptor::{BoxError, ChainResult, InterceptorChain};

    struct FailsToStart;

    impl Interceptor<ClickRequest, ClickResponse> for FailsToStart {
        fn execute(&self, chain: &mut InterceptorChain<'_, ClickRequest, ClickResponse>) -> ChainResult {
            chain.proceed()
        }

        fn start_up(&self) -> Result<(), BoxError> {
            Err("no click store".into())
        }
    }

    #[test]
    fn test_only_enabled_features_are_routed_and_managed() {
        let mut config = BidderConfig::default();
        config.features.enabled = vec![Feature::BID];
        let bidder = Bidder::build(config, Interceptors::default()).unwrap();

        let names: Vec<&str> = bidder.services().iter().map(|s| s.service_name()).collect();
        assert_eq!(names, vec!["bid"]);
        assert!(bidder.router().route("/bid", &Method::POST).is_some());
        assert!(bidder.router().route("/click", &Method::GET).is_none());
        assert!(bidder.router().route("/health", &Method::GET).is_some());
    }

    #[test]
    fn test_start_failure_stops_started_services() {
        let interceptors = Interceptors {
            click: vec![Arc::new(FailsToStart)],
            ..Interceptors::default()
        };
        let bidder = Bidder::build(BidderConfig::default(), interceptors).unwrap();

        let err = bidder.start().unwrap_err();
        assert!(matches!(err, StartupError::Lifecycle(LifecycleError::StartUp { .. })));
        assert!(bidder.services().iter().all(|s| !s.is_running()));
    }

    #[test]
    fn test_duplicate_endpoint_is_fatal() {
        let mut config = BidderConfig::default();
        config.endpoints.click = config.endpoints.impression.clone();
        let err = Bidder::build(config, Interceptors::default()).err().unwrap();
        assert!(matches!(err, StartupError::Route(RouteError::Duplicate { .. })));
    }

    #[test]
    fn test_match_endpoint_is_installed_by_default() {
        let bidder = Bidder::build(BidderConfig::default(), Interceptors::default()).unwrap();

        let names: Vec<&str> = bidder.services().iter().map(|s| s.service_name()).collect();
        assert_eq!(names, vec!["bid", "impression", "click", "match"]);
        let route = bidder.router().route("/match", &Method::GET).unwrap();
        assert_eq!(route.name(), "match");
    }
}
