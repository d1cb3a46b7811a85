//! Impression callbacks: run the impression chain, always answer a pixel.

use std::io::Write;
use std::sync::Arc;

use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::interceptor::{Exchange, InterceptorController, UserRequest, UserResponse};
use crate::observability::metrics::MetricRegistry;
use crate::receiver::{restore_pair, take_pair, RequestReceiver};

/// A 1x1 transparent GIF.
pub const PIXEL_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub type ImpressionRequest = UserRequest;
pub type ImpressionResponse = UserResponse;
pub type ImpressionController = InterceptorController<ImpressionRequest, ImpressionResponse>;

pub struct ImpressionRequestReceiver {
    base: RequestReceiver<ImpressionRequest, ImpressionResponse>,
}

impl ImpressionRequestReceiver {
    pub fn new(
        exchange: Exchange,
        registry: Arc<MetricRegistry>,
        controller: Arc<ImpressionController>,
    ) -> Self {
        Self {
            base: RequestReceiver::new("impression", exchange, registry, controller),
        }
    }

    pub fn base(&self) -> &RequestReceiver<ImpressionRequest, ImpressionResponse> {
        &self.base
    }
}

impl HttpReceiver for ImpressionRequestReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timing = self.base.request_timer().time();

        let (mut request, mut response) = take_pair(ctx, self.base.exchange(), (), ());
        self.base.dispatch(ctx, &mut request, &mut response);
        restore_pair(ctx, request, response);

        let http = ctx.response_mut();
        http.status_ok().media_type(&mime::IMAGE_GIF).reset_content();
        let written = http.content().and_then(|out| Ok(out.write_all(&PIXEL_GIF)?));
        if let Err(e) = written {
            tracing::error!(request_id = %ctx.request_id(), error = %e, "Failed to write pixel");
        }
    }

    fn name(&self) -> &'static str {
        "ImpressionRequestReceiver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::request::HttpRequest;
    use crate::http::response::HttpResponseBuilder;
    use crate::interceptor::{FnInterceptor, Interceptor, InterceptorChain, InterceptorError};

    fn receive(
        interceptors: Vec<Arc<dyn Interceptor<ImpressionRequest, ImpressionResponse>>>,
    ) -> (crate::http::response::HttpResponse, Arc<MetricRegistry>) {
        let registry = Arc::new(MetricRegistry::new());
        let controller = Arc::new(ImpressionController::new("impression", interceptors, &registry));
        controller.start().unwrap();
        let receiver =
            ImpressionRequestReceiver::new(Exchange::NONE, Arc::clone(&registry), controller);
        let request = HttpRequest::builder().uri("/impression?price=1").build();
        let mut ctx = ReceiverContext::new(request, HttpResponseBuilder::new());
        receiver.receive(&mut ctx);
        (ctx.into_response(), registry)
    }

    #[test]
    fn test_pixel_returned_on_success() {
        let seen: Arc<dyn Interceptor<ImpressionRequest, ImpressionResponse>> =
            Arc::new(FnInterceptor::new(
                "price",
                |chain: &mut InterceptorChain<'_, ImpressionRequest, ImpressionResponse>| {
                    assert_eq!(chain.request().http_request().parameter("price").unwrap(), Some("1"));
                    chain.proceed()
                },
            ));
        let (mut response, registry) = receive(vec![seen]);
        assert!(response.is_ok());
        assert_eq!(response.header("content-type"), Some("image/gif"));
        assert_eq!(response.content_bytes().unwrap(), PIXEL_GIF);
        assert_eq!(
            registry.meter("impression.no_exchange.success-response").count(),
            1
        );
    }

    #[test]
    fn test_pixel_returned_on_abort() {
        let abort: Arc<dyn Interceptor<ImpressionRequest, ImpressionResponse>> =
            Arc::new(FnInterceptor::new(
                "abort",
                |_: &mut InterceptorChain<'_, ImpressionRequest, ImpressionResponse>| {
                    Err(InterceptorError::abort("duplicate"))
                },
            ));
        let (mut response, registry) = receive(vec![abort]);
        assert!(response.is_ok());
        assert_eq!(response.content_bytes().unwrap(), PIXEL_GIF);
        assert_eq!(
            registry
                .meter("impression.no_exchange.interceptor-abort-exceptions")
                .count(),
            1
        );
    }
}
