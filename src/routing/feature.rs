//! Capability flags gating which routes a deployment installs.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named capability. Built-ins are provided as constants; deployments may
/// enable any other name as a custom feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Feature {
    name: Cow<'static, str>,
}

impl Feature {
    pub const BID: Feature = Feature::builtin("bid");
    pub const IMPRESSION: Feature = Feature::builtin("impression");
    pub const CLICK: Feature = Feature::builtin("click");
    pub const MATCH: Feature = Feature::builtin("match");
    pub const ADMIN: Feature = Feature::builtin("admin");
    pub const OTHER: Feature = Feature::builtin("other");

    const fn builtin(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// Parse a feature name; built-in names are case-insensitive.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let lowered = name.to_ascii_lowercase();
        Self::builtins()
            .into_iter()
            .find(|f| f.name == lowered.as_str())
            .unwrap_or(Feature {
                name: Cow::Owned(name),
            })
    }

    pub fn builtins() -> [Feature; 6] {
        [
            Feature::BID,
            Feature::IMPRESSION,
            Feature::CLICK,
            Feature::MATCH,
            Feature::ADMIN,
            Feature::OTHER,
        ]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_admin(&self) -> bool {
        *self == Feature::ADMIN
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Feature::new)
    }
}

/// Set of features enabled for a deployment.
pub type FeatureSet = BTreeSet<Feature>;
