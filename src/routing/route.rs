//! Route declarations.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::http::receiver::HttpReceiver;
use crate::routing::feature::{Feature, FeatureSet};
use crate::routing::matcher::PathMatcher;

/// Binds a path spec and a set of methods to a receiver, gated by features.
#[derive(Clone)]
pub struct Route {
    name: String,
    methods: Vec<Method>,
    matcher: PathMatcher,
    receiver: Arc<dyn HttpReceiver>,
    required_features: FeatureSet,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path_spec: impl Into<String>,
        receiver: Arc<dyn HttpReceiver>,
        required_features: impl IntoIterator<Item = Feature>,
    ) -> Self {
        let mut deduped: Vec<Method> = Vec::new();
        for method in methods {
            if !deduped.contains(&method) {
                deduped.push(method);
            }
        }
        Self {
            name: name.into(),
            methods: deduped,
            matcher: PathMatcher::new(path_spec),
            receiver,
            required_features: required_features.into_iter().collect(),
        }
    }

    pub fn get(
        name: impl Into<String>,
        path_spec: impl Into<String>,
        receiver: Arc<dyn HttpReceiver>,
        required_features: impl IntoIterator<Item = Feature>,
    ) -> Self {
        Self::new(name, [Method::GET], path_spec, receiver, required_features)
    }

    pub fn post(
        name: impl Into<String>,
        path_spec: impl Into<String>,
        receiver: Arc<dyn HttpReceiver>,
        required_features: impl IntoIterator<Item = Feature>,
    ) -> Self {
        Self::new(name, [Method::POST], path_spec, receiver, required_features)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn receiver(&self) -> &Arc<dyn HttpReceiver> {
        &self.receiver
    }

    pub fn required_features(&self) -> &FeatureSet {
        &self.required_features
    }

    /// A route with no required features is always installed; otherwise at
    /// least one of its features must be enabled.
    pub fn has_required_features(&self, enabled: &FeatureSet) -> bool {
        self.required_features.is_empty() || !self.required_features.is_disjoint(enabled)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("path", &self.matcher.spec())
            .field("receiver", &self.receiver.name())
            .field("required_features", &self.required_features)
            .finish()
    }
}
