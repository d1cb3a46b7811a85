//! Pieces shared by requests and responses: multimaps, header helpers, errors.

use std::collections::BTreeMap;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use mime::Mime;
use thiserror::Error;

use crate::http::content::Charset;

/// Errors raised while building or reading messages.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid request URI `{0}`")]
    InvalidUri(String),

    #[error("request has no URI")]
    MissingUri,

    #[error("parameter `{0}` has more than one value")]
    AmbiguousParameter(String),

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("invalid cookie `{name}`: {reason}")]
    InvalidCookie { name: String, reason: &'static str },
}

/// Ordered multimap with string keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multimap<V> {
    entries: BTreeMap<String, Vec<V>>,
}

impl<V> Multimap<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: V) {
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// Replace every value under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), vec![value]);
    }

    pub fn get(&self, key: &str) -> &[V] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&V> {
        self.get(key).first()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Vec<V> {
        self.entries.remove(key).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate every (key, value) pair, keys in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v)))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().flatten()
    }

    /// Number of values across all keys.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for Multimap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Multimap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Multimap::new();
        for (key, value) in iter {
            map.put(key, value);
        }
        map
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HttpError> {
    let invalid = || HttpError::InvalidHeader {
        name: name.to_string(),
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name, value))
}

/// First value of `name` as text, ignoring non-visible values.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parsed `Content-Type`.
pub(crate) fn media_type(headers: &HeaderMap) -> Option<Mime> {
    header_str(headers, header::CONTENT_TYPE.as_str()).and_then(|v| v.parse().ok())
}

/// Charset declared by the `Content-Type` parameter, if recognized.
pub(crate) fn declared_charset(headers: &HeaderMap) -> Option<Charset> {
    media_type(headers)
        .as_ref()
        .and_then(|m| m.get_param(mime::CHARSET))
        .and_then(|c| Charset::from_label(c.as_str()))
}
