//! Domain request/response pairs handed through interceptor chains.
//!
//! Each pair wraps the transport message together with a native payload:
//! the decoded bid request, a click's redirect target, and so on.

use std::borrow::Cow;
use std::fmt;

use serde_json::{Map, Value};

use crate::http::request::HttpRequest;
use crate::http::response::HttpResponseBuilder;

/// The ad exchange a request came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Exchange {
    name: Cow<'static, str>,
}

impl Exchange {
    /// Placeholder for endpoints not tied to an exchange.
    pub const NONE: Exchange = Exchange {
        name: Cow::Borrowed("no_exchange"),
    };

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Exchange::NONE
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Anything scoped to an exchange. Chains use it to skip interceptors that
/// only understand other exchanges.
pub trait OnExchange {
    fn exchange(&self) -> &Exchange;
}

/// An exchange request: the transport request plus its decoded payload.
#[derive(Debug)]
pub struct UserRequest<N = ()> {
    exchange: Exchange,
    http: HttpRequest,
    native: N,
}

impl<N> UserRequest<N> {
    pub fn new(exchange: Exchange, http: HttpRequest, native: N) -> Self {
        Self {
            exchange,
            http,
            native,
        }
    }

    pub fn http_request(&self) -> &HttpRequest {
        &self.http
    }

    pub fn http_request_mut(&mut self) -> &mut HttpRequest {
        &mut self.http
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut N {
        &mut self.native
    }

    pub fn into_parts(self) -> (HttpRequest, N) {
        (self.http, self.native)
    }
}

impl<N> OnExchange for UserRequest<N> {
    fn exchange(&self) -> &Exchange {
        &self.exchange
    }
}

/// The response side: the transport response being built, the native
/// payload interceptors fill in, and free-form metadata for later stages.
#[derive(Debug)]
pub struct UserResponse<N = ()> {
    exchange: Exchange,
    http: HttpResponseBuilder,
    native: N,
    metadata: Map<String, Value>,
}

impl<N> UserResponse<N> {
    pub fn new(exchange: Exchange, http: HttpResponseBuilder, native: N) -> Self {
        Self {
            exchange,
            http,
            native,
            metadata: Map::new(),
        }
    }

    pub fn http_response(&self) -> &HttpResponseBuilder {
        &self.http
    }

    pub fn http_response_mut(&mut self) -> &mut HttpResponseBuilder {
        &mut self.http
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut N {
        &mut self.native
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    pub fn into_parts(self) -> (HttpResponseBuilder, N) {
        (self.http, self.native)
    }
}

impl<N> OnExchange for UserResponse<N> {
    fn exchange(&self) -> &Exchange {
        &self.exchange
    }
}
