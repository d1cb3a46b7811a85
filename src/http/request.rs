//! Transport-neutral HTTP request and its builder.
//!
//! # Design Decisions
//! - All mutable state lives on `HttpRequestBuilder`; `build()` snapshots it
//! - The query string is parsed into parameters when the URI is set
//! - A missing or unparsable URI is kept and reported when the path is read,
//!   so the router can answer 400 instead of failing the transport

use std::io::Write;
use std::net::SocketAddr;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::uri::Authority;
use http::{Method, Uri, Version};
use mime::Mime;

use crate::http::content::{ContentError, ContentHolder, Source, TextReader, TextWriter};
use crate::http::cookie::Cookie;
use crate::http::message::{self, HttpError, Multimap};

#[derive(Debug, Clone, Default)]
enum RequestUri {
    #[default]
    Missing,
    Valid(Uri),
    Invalid(String),
}

/// An immutable HTTP request. Only its body is consumed after build.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    version: Version,
    uri: RequestUri,
    remote_addr: Option<SocketAddr>,
    headers: HeaderMap,
    cookies: Multimap<Cookie>,
    parameters: Multimap<String>,
    content: ContentHolder,
}

impl HttpRequest {
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::new()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn uri(&self) -> Result<&Uri, HttpError> {
        match &self.uri {
            RequestUri::Valid(uri) => Ok(uri),
            RequestUri::Invalid(raw) => Err(HttpError::InvalidUri(raw.clone())),
            RequestUri::Missing => Err(HttpError::MissingUri),
        }
    }

    /// Path component used for routing.
    pub fn path(&self) -> Result<&str, HttpError> {
        let uri = self.uri()?;
        let path = uri.path();
        if !path.is_empty() && !path.starts_with('/') {
            return Err(HttpError::InvalidUri(uri.to_string()));
        }
        Ok(path)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        message::header_str(&self.headers, name)
    }

    pub fn media_type(&self) -> Option<Mime> {
        message::media_type(&self.headers)
    }

    pub fn cookies(&self) -> &Multimap<Cookie> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.first(name)
    }

    pub fn parameters(&self) -> &Multimap<String> {
        &self.parameters
    }

    /// Single value of a parameter. Fails if the parameter has several values.
    pub fn parameter(&self, name: &str) -> Result<Option<&str>, HttpError> {
        match self.parameters.get(name) {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            _ => Err(HttpError::AmbiguousParameter(name.to_string())),
        }
    }

    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.parameters.get(name)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys()
    }

    pub fn is_secure(&self) -> bool {
        self.uri()
            .ok()
            .and_then(Uri::scheme_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("https"))
    }

    fn host_authority(&self) -> Option<(&str, Authority)> {
        let host = self.header(header::HOST.as_str())?;
        let authority = host.parse::<Authority>().ok()?;
        Some((host, authority))
    }

    /// Host name from the `Host` header, without port. IPv6 literals keep
    /// their brackets.
    pub fn server_name(&self) -> Option<&str> {
        let (host, authority) = self.host_authority()?;
        let name = authority.host();
        host.find(name).map(|start| &host[start..start + name.len()])
    }

    /// Port from the `Host` header, else the scheme default.
    pub fn server_port(&self) -> Option<u16> {
        let (_, authority) = self.host_authority()?;
        match authority.port_u16() {
            Some(port) => Some(port),
            None if authority.port().is_some() => None,
            None if self.is_secure() => Some(443),
            None => Some(80),
        }
    }

    /// Body size, when the transport or a buffered round-trip told us.
    pub fn content_length(&self) -> Option<u64> {
        self.content.length()
    }

    pub fn content(&mut self) -> Result<&mut Source, ContentError> {
        self.content.input_in()
    }

    pub fn content_reader(&mut self) -> Result<TextReader<'_>, ContentError> {
        self.content.set_declared_charset(message::declared_charset(&self.headers));
        self.content.input_reader()
    }

    pub fn content_holder(&self) -> &ContentHolder {
        &self.content
    }

    /// A builder with everything but the body.
    pub fn to_builder(&self) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method: self.method.clone(),
            version: self.version,
            uri: self.uri.clone(),
            remote_addr: self.remote_addr,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            parameters: self.parameters.clone(),
            content: ContentHolder::new(),
        }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        HttpRequestBuilder::new().build()
    }
}

/// Mutable side of [`HttpRequest`].
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Method,
    version: Version,
    uri: RequestUri,
    remote_addr: Option<SocketAddr>,
    headers: HeaderMap,
    cookies: Multimap<Cookie>,
    parameters: Multimap<String>,
    content: ContentHolder,
}

impl HttpRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = version;
        self
    }

    /// Set the URI from text; query parameters are added to the parameters.
    pub fn uri(&mut self, uri: &str) -> &mut Self {
        match uri.parse::<Uri>() {
            Ok(parsed) => self.parsed_uri(parsed),
            Err(_) => {
                self.uri = RequestUri::Invalid(uri.to_string());
                self
            }
        }
    }

    pub fn parsed_uri(&mut self, uri: Uri) -> &mut Self {
        if let Some(query) = uri.query() {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                self.parameters.put(name, value.into_owned());
            }
        }
        self.uri = RequestUri::Valid(uri);
        self
    }

    pub fn remote_addr(&mut self, addr: SocketAddr) -> &mut Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Append a header value.
    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn text_header(&mut self, name: &str, value: &str) -> Result<&mut Self, HttpError> {
        let (name, value) = message::parse_header(name, value)?;
        Ok(self.header(name, value))
    }

    pub fn headers(&mut self, headers: HeaderMap) -> &mut Self {
        for (name, value) in headers.iter() {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    pub fn headers_ref(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn media_type(&mut self, media_type: &Mime) -> &mut Self {
        if let Ok(value) = HeaderValue::from_str(media_type.as_ref()) {
            self.headers.insert(header::CONTENT_TYPE, value);
        }
        self
    }

    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.cookies.put(cookie.name().to_string(), cookie);
        self
    }

    pub fn parameter(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parameters.put(name, value.into());
        self
    }

    /// Replace the body with a transport-provided holder.
    pub fn content_holder(&mut self, content: ContentHolder) -> &mut Self {
        self.content = content;
        self
    }

    /// Shorthand for an in-memory body ready to be read.
    pub fn body(&mut self, bytes: impl Into<bytes::Bytes>) -> &mut Self {
        self.content_holder(ContentHolder::from_bytes(bytes))
    }

    pub fn content(&mut self) -> Result<&mut dyn Write, ContentError> {
        self.content.output_out()
    }

    pub fn content_writer(&mut self) -> Result<TextWriter<'_>, ContentError> {
        self.content.set_declared_charset(message::declared_charset(&self.headers));
        self.content.output_writer()
    }

    pub fn print_content(&mut self, text: &str) -> Result<&mut Self, ContentError> {
        self.content_writer()?.print(text)?;
        Ok(self)
    }

    /// Snapshot the builder. The body moves into the request (closing any open
    /// output); the builder keeps everything else and starts a fresh body.
    pub fn build(&mut self) -> HttpRequest {
        let mut content = std::mem::take(&mut self.content);
        if let Err(e) = content.close_if_output() {
            tracing::warn!(error = %e, "Failed to close request content");
        }
        content.set_declared_charset(message::declared_charset(&self.headers));
        HttpRequest {
            method: self.method.clone(),
            version: self.version,
            uri: self.uri.clone(),
            remote_addr: self.remote_addr,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            parameters: self.parameters.clone(),
            content,
        }
    }
}
