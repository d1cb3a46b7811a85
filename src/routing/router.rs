//! Route table construction and request dispatch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use thiserror::Error;

use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::observability::metrics::{Meter, MetricRegistry};
use crate::routing::fallback::{
    AllowedMethods, MethodNotAllowedReceiver, NotFoundReceiver, OptionsReceiver,
};
use crate::routing::feature::FeatureSet;
use crate::routing::matcher::PathMatcher;
use crate::routing::route::Route;

/// Route table build failures. Always fatal at startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("conflicting handlers for {method} {path}: `{existing}` and `{conflicting}`")]
    Duplicate {
        method: Method,
        path: String,
        existing: String,
        conflicting: String,
    },

    #[error("route `{0}` declares no methods")]
    NoMethods(String),
}

type MethodTable = HashMap<Method, Arc<Route>>;

struct RouterMeters {
    bad_request: Arc<Meter>,
    not_found: Arc<Meter>,
    method_not_allowed: Arc<Meter>,
}

/// Immutable (matcher × method) → route table.
pub struct Router {
    table: BTreeMap<PathMatcher, MethodTable>,
    not_found: Arc<dyn HttpReceiver>,
    method_not_allowed: Arc<dyn HttpReceiver>,
    meters: Option<RouterMeters>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Dispatch one request to exactly one receiver.
    pub fn receive(&self, ctx: &mut ReceiverContext) {
        let path = match ctx.request().path() {
            Ok(path) => path.to_string(),
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = %e,
                    "Rejecting request with invalid path"
                );
                self.mark(|m| &m.bad_request);
                ctx.response_mut().status(StatusCode::BAD_REQUEST);
                return;
            }
        };

        let Some((matcher, methods)) = self.table.iter().find(|(m, _)| m.matches(&path)) else {
            tracing::debug!(request_id = %ctx.request_id(), path = %path, "No route matched");
            self.mark(|m| &m.not_found);
            self.not_found.receive(ctx);
            return;
        };

        let method = ctx.request().method().clone();
        let route = methods.get(&method);
        if route.is_none() || method == Method::OPTIONS {
            ctx.attributes_mut().insert(AllowedMethods(sorted_methods(methods)));
        }

        match route {
            Some(route) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    route = %route.name(),
                    method = %method,
                    path = %path,
                    "Route matched"
                );
                route.receiver().receive(ctx);
            }
            None => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    method = %method,
                    matcher = %matcher,
                    "Method not allowed"
                );
                self.mark(|m| &m.method_not_allowed);
                self.method_not_allowed.receive(ctx);
            }
        }
    }

    /// Methods accepted by the first matcher for `path`, OPTIONS included.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.table
            .iter()
            .find(|(m, _)| m.matches(path))
            .map(|(_, methods)| sorted_methods(methods))
            .unwrap_or_default()
    }

    /// Matchers in the order they are tried.
    pub fn matchers(&self) -> impl Iterator<Item = &PathMatcher> {
        self.table.keys()
    }

    /// Route registered for an exact (spec, method) pair.
    pub fn route(&self, path_spec: &str, method: &Method) -> Option<&Route> {
        self.table
            .get(&PathMatcher::new(path_spec))
            .and_then(|methods| methods.get(method))
            .map(Arc::as_ref)
    }

    fn mark(&self, meter: impl Fn(&RouterMeters) -> &Arc<Meter>) {
        if let Some(meters) = &self.meters {
            meter(meters).mark();
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (matcher, methods) in &self.table {
            map.entry(&matcher.spec(), &sorted_methods(methods));
        }
        map.finish()
    }
}

fn sorted_methods(methods: &MethodTable) -> Vec<Method> {
    let mut sorted: Vec<Method> = methods.keys().cloned().collect();
    sorted.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    sorted
}

/// Collects route declarations and fallbacks, then freezes them.
pub struct RouterBuilder {
    routes: Vec<Route>,
    enabled: FeatureSet,
    options: Arc<dyn HttpReceiver>,
    not_found: Arc<dyn HttpReceiver>,
    method_not_allowed: Arc<dyn HttpReceiver>,
    registry: Option<Arc<MetricRegistry>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            enabled: FeatureSet::new(),
            options: Arc::new(OptionsReceiver),
            not_found: Arc::new(NotFoundReceiver),
            method_not_allowed: Arc::new(MethodNotAllowedReceiver),
            registry: None,
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn enabled_features(mut self, features: FeatureSet) -> Self {
        self.enabled = features;
        self
    }

    pub fn options_receiver(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.options = receiver;
        self
    }

    pub fn not_found_receiver(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.not_found = receiver;
        self
    }

    pub fn method_not_allowed_receiver(mut self, receiver: Arc<dyn HttpReceiver>) -> Self {
        self.method_not_allowed = receiver;
        self
    }

    /// Count bad-request, not-found and method-not-allowed outcomes.
    pub fn metrics(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let mut table: BTreeMap<PathMatcher, MethodTable> = BTreeMap::new();

        for route in self.routes {
            if !route.has_required_features(&self.enabled) {
                tracing::debug!(
                    route = %route.name(),
                    required = ?route.required_features(),
                    "Route skipped, required features not enabled"
                );
                continue;
            }
            if route.methods().is_empty() {
                return Err(RouteError::NoMethods(route.name().to_string()));
            }

            let route = Arc::new(route);
            let methods = table.entry(route.matcher().clone()).or_default();
            for method in route.methods() {
                if let Some(existing) = methods.get(method) {
                    return Err(RouteError::Duplicate {
                        method: method.clone(),
                        path: route.matcher().spec().to_string(),
                        existing: existing.name().to_string(),
                        conflicting: route.name().to_string(),
                    });
                }
                methods.insert(method.clone(), Arc::clone(&route));
            }
        }

        // Declared OPTIONS routes take precedence over the synthesized one.
        for (matcher, methods) in table.iter_mut() {
            methods.entry(Method::OPTIONS).or_insert_with(|| {
                Arc::new(Route::new(
                    "default_options",
                    [Method::OPTIONS],
                    matcher.spec(),
                    Arc::clone(&self.options),
                    [],
                ))
            });
        }

        for (matcher, methods) in &table {
            for (method, route) in methods {
                tracing::debug!(
                    method = %method,
                    path = %matcher,
                    route = %route.name(),
                    "Route installed"
                );
            }
        }
        tracing::info!(paths = table.len(), "Router built");

        let meters = self.registry.map(|registry| RouterMeters {
            bad_request: registry.meter(&MetricRegistry::name(&["router", "bad-request"])),
            not_found: registry.meter(&MetricRegistry::name(&["router", "not-found"])),
            method_not_allowed: registry
                .meter(&MetricRegistry::name(&["router", "method-not-allowed"])),
        });

        Ok(Router {
            table,
            not_found: self.not_found,
            method_not_allowed: self.method_not_allowed,
            meters,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
