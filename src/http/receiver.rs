//! The seam between a transport and everything that handles a request.

use http::Extensions;

use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, HttpResponseBuilder};
use crate::http::X_REQUEST_ID;

/// Handles one request, writing into the context's response builder.
///
/// Receivers run synchronously on the worker that owns the request and
/// never fail: every outcome is expressed as a response.
pub trait HttpReceiver: Send + Sync {
    fn receive(&self, ctx: &mut ReceiverContext);

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F> HttpReceiver for F
where
    F: Fn(&mut ReceiverContext) + Send + Sync,
{
    fn receive(&self, ctx: &mut ReceiverContext) {
        self(ctx)
    }
}

/// Per-request state handed to receivers: the built request, the response
/// being built, and request-scoped attributes.
#[derive(Debug)]
pub struct ReceiverContext {
    request: HttpRequest,
    response: HttpResponseBuilder,
    attributes: Extensions,
    request_id: String,
}

impl ReceiverContext {
    /// Takes the request id from `x-request-id`, generating one if absent.
    pub fn new(request: HttpRequest, response: HttpResponseBuilder) -> Self {
        let request_id = request
            .header(X_REQUEST_ID)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            request,
            response,
            attributes: Extensions::new(),
            request_id,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    pub fn response(&self) -> &HttpResponseBuilder {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponseBuilder {
        &mut self.response
    }

    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Extensions {
        &mut self.attributes
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Build the final response.
    pub fn into_response(mut self) -> HttpResponse {
        self.response.build()
    }
}
