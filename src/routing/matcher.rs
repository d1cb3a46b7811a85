//! Path specs and their precedence.
//!
//! # Spec Grammar
//! - `""` matches only the empty path (root)
//! - `"/"` matches only `/` (default)
//! - `/a/b/*` matches every path starting with `/a/b/` (prefix)
//! - `*.ext` matches every path ending with `.ext` (suffix)
//! - anything else matches itself exactly
//!
//! # Design Decisions
//! - Matchers are totally ordered: match type first, then spec text in
//!   reverse lexicographic order, so longer exact paths and deeper prefixes
//!   are tried before shorter ones without explicit priorities
//! - No regex; every match is a single string comparison

use std::cmp::Ordering;
use std::fmt;

/// Match classes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchType {
    Root,
    Default,
    Exact,
    Prefix,
    Suffix,
}

impl MatchType {
    /// Classify a path spec.
    pub fn classify(spec: &str) -> Self {
        if spec.is_empty() {
            MatchType::Root
        } else if spec == "/" {
            MatchType::Default
        } else if spec.starts_with('/') && spec.ends_with("/*") {
            MatchType::Prefix
        } else if spec.len() > 2 && spec.starts_with("*.") {
            MatchType::Suffix
        } else {
            MatchType::Exact
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathMatcher {
    match_type: MatchType,
    spec: String,
}

impl PathMatcher {
    pub fn new(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        Self {
            match_type: MatchType::classify(&spec),
            spec,
        }
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn matches(&self, path: &str) -> bool {
        match self.match_type {
            MatchType::Root => path.is_empty(),
            MatchType::Default => path == "/",
            MatchType::Exact => path == self.spec,
            // "/foo/*" keeps the trailing slash: "/foo/" matches, "/foo" does not.
            MatchType::Prefix => path.starts_with(&self.spec[..self.spec.len() - 1]),
            MatchType::Suffix => path.ends_with(&self.spec[1..]),
        }
    }
}

impl Ord for PathMatcher {
    fn cmp(&self, other: &Self) -> Ordering {
        self.match_type
            .cmp(&other.match_type)
            .then_with(|| other.spec.cmp(&self.spec))
    }
}

impl PartialOrd for PathMatcher {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(MatchType::classify(""), MatchType::Root);
        assert_eq!(MatchType::classify("/"), MatchType::Default);
        for exact in ["/foo", "/foo*", "/foo/*.html", "foo/*", "foo/bar/*", "*.", "/foo/bar"] {
            assert_eq!(MatchType::classify(exact), MatchType::Exact, "{exact}");
        }
        for prefix in ["/*", "/foo/*", "/foo/*/bar/*", "/foo/*.html/bar/*"] {
            assert_eq!(MatchType::classify(prefix), MatchType::Prefix, "{prefix}");
        }
        for suffix in ["*.html", "*.*", "*.*."] {
            assert_eq!(MatchType::classify(suffix), MatchType::Suffix, "{suffix}");
        }
    }

    #[test]
    fn test_root_and_default() {
        let root = PathMatcher::new("");
        assert!(root.matches(""));
        assert!(!root.matches("/"));

        let default = PathMatcher::new("/");
        assert!(default.matches("/"));
        assert!(!default.matches(""));
        assert!(!default.matches("/foo"));
    }

    #[test]
    fn test_exact() {
        let matcher = PathMatcher::new("/foo");
        assert!(matcher.matches("/foo"));
        assert!(!matcher.matches("/foo/"));
        assert!(!matcher.matches("/foobar"));
    }

    #[test]
    fn test_prefix() {
        let matcher = PathMatcher::new("/foo/*");
        assert!(!matcher.matches("/foo"));
        assert!(matcher.matches("/foo/"));
        assert!(matcher.matches("/foo/bar"));
        assert!(!matcher.matches("/foobar"));

        let everything = PathMatcher::new("/*");
        assert!(everything.matches("/"));
        assert!(everything.matches("/anything/at/all"));
        assert!(!everything.matches(""));
    }

    #[test]
    fn test_suffix() {
        let matcher = PathMatcher::new("*.html");
        assert!(matcher.matches("foo.html"));
        assert!(matcher.matches("/a/b/c/foo.html"));
        assert!(!matcher.matches("/foo.html/bar"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn test_ordering() {
        let mut matchers: Vec<_> = ["*.html", "/*", "/foo", "", "/foo/*", "/", "/foo/bar/*", "/foo/bar"]
            .into_iter()
            .map(PathMatcher::new)
            .collect();
        matchers.sort();
        let specs: Vec<_> = matchers.iter().map(PathMatcher::spec).collect();
        assert_eq!(
            specs,
            vec!["", "/", "/foo/bar", "/foo", "/foo/bar/*", "/foo/*", "/*", "*.html"]
        );
    }
}
