//! Click tracking: run the click chain, then redirect if it chose a target.

use std::sync::Arc;

use http::{header, StatusCode};

use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::interceptor::{Exchange, InterceptorController, UserRequest, UserResponse};
use crate::observability::metrics::{Meter, MetricRegistry};
use crate::receiver::{restore_pair, take_pair, Outcome, RequestReceiver};

pub type ClickRequest = UserRequest;
pub type ClickResponse = UserResponse;
pub type ClickController = InterceptorController<ClickRequest, ClickResponse>;

/// Interceptors redirect with `response.http_response_mut().redirect(url)`.
pub struct ClickRequestReceiver {
    base: RequestReceiver<ClickRequest, ClickResponse>,
    no_redirect: Arc<Meter>,
}

impl ClickRequestReceiver {
    pub fn new(
        exchange: Exchange,
        registry: Arc<MetricRegistry>,
        controller: Arc<ClickController>,
    ) -> Self {
        let base = RequestReceiver::new("click", exchange, registry, controller);
        let no_redirect = base.build_meter("no-redirect");
        Self { base, no_redirect }
    }

    pub fn base(&self) -> &RequestReceiver<ClickRequest, ClickResponse> {
        &self.base
    }
}

impl HttpReceiver for ClickRequestReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timing = self.base.request_timer().time();

        let (mut request, mut response) = take_pair(ctx, self.base.exchange(), (), ());
        let outcome = self.base.dispatch(ctx, &mut request, &mut response);
        restore_pair(ctx, request, response);

        let request_id = ctx.request_id().to_string();
        let http = ctx.response_mut();
        if outcome != Outcome::Success {
            http.remove_header(&header::LOCATION).reset_content().status_ok();
            return;
        }

        let redirect = http.status_code().is_redirection() && http.redirect_location().is_some();
        if redirect {
            tracing::debug!(
                request_id = %request_id,
                location = http.redirect_location().unwrap_or_default(),
                "Click redirect"
            );
            http.status(StatusCode::FOUND);
        } else {
            tracing::debug!(request_id = %request_id, "No redirect location");
            self.no_redirect.mark();
            http.remove_header(&header::LOCATION).status_ok();
        }
    }

    fn name(&self) -> &'static str {
        "ClickRequestReceiver"
    }
}
