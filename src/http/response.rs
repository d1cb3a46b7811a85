//! Transport-neutral HTTP response and its builder.

use std::io::Write;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{StatusCode, Version};
use mime::Mime;

use crate::http::content::{
    ContentError, ContentHolder, ContentState, Source, TextReader, TextWriter,
};
use crate::http::cookie::Cookie;
use crate::http::message::{self, HttpError, Multimap};

/// An immutable HTTP response.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    cookies: Multimap<Cookie>,
    content: ContentHolder,
}

impl HttpResponse {
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::new()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
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

    pub fn redirect_location(&self) -> Option<&str> {
        self.header(header::LOCATION.as_str())
    }

    pub fn cookies(&self) -> &Multimap<Cookie> {
        &self.cookies
    }

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

    /// Whole body as text in the declared charset.
    pub fn content_string(&mut self) -> Result<String, ContentError> {
        self.content_reader()?.read_to_string()
    }

    /// Whole body as bytes.
    pub fn content_bytes(&mut self) -> Result<Vec<u8>, ContentError> {
        self.content.read_bytes()
    }

    pub fn to_builder(&self) -> HttpResponseBuilder {
        HttpResponseBuilder {
            status: self.status,
            version: self.version,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            content: ContentHolder::new(),
        }
    }
}

/// Mutable side of [`HttpResponse`]. Starts as `200 OK` with an empty body.
#[derive(Debug)]
pub struct HttpResponseBuilder {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    cookies: Multimap<Cookie>,
    content: ContentHolder,
}

impl HttpResponseBuilder {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            cookies: Multimap::new(),
            content: ContentHolder::new(),
        }
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn status_ok(&mut self) -> &mut Self {
        self.status(StatusCode::OK)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = version;
        self
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(&mut self, location: &str) -> Result<&mut Self, HttpError> {
        let value = HeaderValue::from_str(location).map_err(|_| HttpError::InvalidHeader {
            name: header::LOCATION.to_string(),
        })?;
        self.headers.insert(header::LOCATION, value);
        Ok(self.status(StatusCode::FOUND))
    }

    pub fn redirect_location(&self) -> Option<&str> {
        message::header_str(&self.headers, header::LOCATION.as_str())
    }

    /// Append a header value.
    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all values of a header.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    pub fn text_header(&mut self, name: &str, value: &str) -> Result<&mut Self, HttpError> {
        let (name, value) = message::parse_header(name, value)?;
        Ok(self.header(name, value))
    }

    pub fn remove_header(&mut self, name: &HeaderName) -> &mut Self {
        self.headers.remove(name);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
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

    pub fn cookies(&self) -> &Multimap<Cookie> {
        &self.cookies
    }

    /// Remove every cookie, returning them.
    pub fn take_cookies(&mut self) -> Multimap<Cookie> {
        std::mem::take(&mut self.cookies)
    }

    pub fn content_holder(&mut self, content: ContentHolder) -> &mut Self {
        self.content = content;
        self
    }

    /// State of the body being built.
    pub fn content_state(&self) -> ContentState {
        self.content.state()
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

    /// Drop whatever body was written and start over.
    pub fn reset_content(&mut self) -> &mut Self {
        self.content = ContentHolder::new();
        self
    }

    /// Back to `200 OK` with no headers, cookies or body. The version is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.cookies.clear();
        self.reset_content()
    }

    /// Snapshot the builder; the body moves into the response.
    pub fn build(&mut self) -> HttpResponse {
        let mut content = std::mem::take(&mut self.content);
        if let Err(e) = content.close_if_output() {
            tracing::warn!(error = %e, "Failed to close response content");
        }
        content.set_declared_charset(message::declared_charset(&self.headers));
        HttpResponse {
            status: self.status,
            version: self.version,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            content,
        }
    }
}

impl Default for HttpResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
