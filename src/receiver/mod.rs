//! Request receivers: the seam between one transport request and one
//! interceptor chain.
//!
//! # Data Flow
//! ```text
//! Router → XxxRequestReceiver.receive(ctx)
//!     → start request timer
//!     → decode ctx.request into a UserRequest (bid.rs: BidCodec)
//!     → wrap ctx.response into a UserResponse
//!     → RequestReceiver::dispatch → controller.on_request
//!     → classify: success / aborted / other (panics included)
//!     → write the response body, restore ctx, stop timer
//! ```
//!
//! # Design Decisions
//! - Exactly one outcome meter is marked per request
//! - Aborts and failures still yield a well-formed response
//! - Panics in interceptors are caught here and never reach the transport

pub mod bid;
pub mod click;
pub mod health;
pub mod impression;
pub mod r#match;
pub mod pool;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::http::receiver::ReceiverContext;
use crate::http::response::HttpResponseBuilder;
use crate::interceptor::{
    Exchange, InterceptorController, InterceptorError, OnExchange, UserRequest, UserResponse,
};
use crate::observability::metrics::{Meter, MetricRegistry, Timer};

pub use bid::{BidCodec, BidRequestReceiver, DecodeError, JsonCodec};
pub use click::ClickRequestReceiver;
pub use health::HealthReceiver;
pub use impression::ImpressionRequestReceiver;
pub use r#match::MatchRequestReceiver;

/// How a chain invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Aborted,
    Failed,
}

/// Shared receiver machinery: controller, exchange identity, outcome meters.
pub struct RequestReceiver<Req, Resp> {
    kind: &'static str,
    exchange: Exchange,
    controller: Arc<InterceptorController<Req, Resp>>,
    registry: Arc<MetricRegistry>,
    success: Arc<Meter>,
    aborted: Arc<Meter>,
    failed: Arc<Meter>,
    request_timer: Arc<Timer>,
}

impl<Req, Resp> RequestReceiver<Req, Resp>
where
    Req: OnExchange,
{
    /// Metric names are `<kind>.<exchange>.<metric>`.
    pub fn new(
        kind: &'static str,
        exchange: Exchange,
        registry: Arc<MetricRegistry>,
        controller: Arc<InterceptorController<Req, Resp>>,
    ) -> Self {
        let metric = |name: &str| MetricRegistry::name(&[kind, exchange.name(), name]);
        let success = registry.meter(&metric("success-response"));
        let aborted = registry.meter(&metric("interceptor-abort-exceptions"));
        let failed = registry.meter(&metric("interceptor-exceptions"));
        let request_timer = registry.timer(&metric("request-timer"));
        Self {
            kind,
            exchange,
            controller,
            registry,
            success,
            aborted,
            failed,
            request_timer,
        }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn controller(&self) -> &Arc<InterceptorController<Req, Resp>> {
        &self.controller
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn request_timer(&self) -> &Timer {
        &self.request_timer
    }

    pub fn success_meter(&self) -> &Meter {
        &self.success
    }

    pub fn abort_meter(&self) -> &Meter {
        &self.aborted
    }

    pub fn failure_meter(&self) -> &Meter {
        &self.failed
    }

    /// A receiver-specific meter under the same namespace.
    pub fn build_meter(&self, name: &str) -> Arc<Meter> {
        self.registry
            .meter(&MetricRegistry::name(&[self.kind, self.exchange.name(), name]))
    }

    /// Run the controller and classify the result, marking exactly one
    /// outcome meter.
    pub fn dispatch(&self, ctx: &ReceiverContext, request: &mut Req, response: &mut Resp) -> Outcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.controller.on_request(request, response)
        }));

        match result {
            Ok(Ok(())) => {
                self.success.mark();
                Outcome::Success
            }
            Ok(Err(InterceptorError::Abort { reason })) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    exchange = %self.exchange,
                    reason = %reason,
                    "Interceptor aborted request"
                );
                self.aborted.mark();
                Outcome::Aborted
            }
            Ok(Err(e)) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    exchange = %self.exchange,
                    controller = %self.controller.name(),
                    error = %e,
                    "Interceptor chain failed"
                );
                self.failed.mark();
                Outcome::Failed
            }
            Err(payload) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    exchange = %self.exchange,
                    controller = %self.controller.name(),
                    panic = %panic_message(payload.as_ref()),
                    "Interceptor panicked"
                );
                self.failed.mark();
                Outcome::Failed
            }
        }
    }

    /// Drop cookies an endpoint cannot send.
    pub fn dont_set_cookies(&self, ctx: &ReceiverContext, response: &mut HttpResponseBuilder) {
        if !response.cookies().is_empty() {
            let dropped = response.take_cookies();
            tracing::warn!(
                request_id = %ctx.request_id(),
                receiver = self.kind,
                cookies = dropped.len(),
                "Output cookies are not supported for this endpoint"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Move the transport request and response out of `ctx` into a domain pair.
pub(crate) fn take_pair<N, M>(
    ctx: &mut ReceiverContext,
    exchange: &Exchange,
    native_request: N,
    native_response: M,
) -> (UserRequest<N>, UserResponse<M>) {
    let http_request = std::mem::take(ctx.request_mut());
    let http_response = std::mem::take(ctx.response_mut());
    (
        UserRequest::new(exchange.clone(), http_request, native_request),
        UserResponse::new(exchange.clone(), http_response, native_response),
    )
}

/// Put the transport halves back into `ctx`, returning the native payloads.
pub(crate) fn restore_pair<N, M>(
    ctx: &mut ReceiverContext,
    request: UserRequest<N>,
    response: UserResponse<M>,
) -> (N, M) {
    let (http_request, native_request) = request.into_parts();
    let (http_response, native_response) = response.into_parts();
    *ctx.request_mut() = http_request;
    *ctx.response_mut() = http_response;
    (native_request, native_response)
}
