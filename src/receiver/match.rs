//! Cookie matching: run the match chain and answer whatever it built.
//!
//! Interceptors own the response on this endpoint. They typically set the
//! user-id cookie and either redirect to the exchange's match URL or write a
//! pixel, so cookies survive every outcome except a failure.

use std::sync::Arc;

use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::interceptor::{Exchange, InterceptorController, UserRequest, UserResponse};
use crate::observability::metrics::MetricRegistry;
use crate::receiver::{restore_pair, take_pair, Outcome, RequestReceiver};

pub type MatchRequest = UserRequest;
pub type MatchResponse = UserResponse;
pub type MatchController = InterceptorController<MatchRequest, MatchResponse>;

pub struct MatchRequestReceiver {
    base: RequestReceiver<MatchRequest, MatchResponse>,
}

impl MatchRequestReceiver {
    pub fn new(
        exchange: Exchange,
        registry: Arc<MetricRegistry>,
        controller: Arc<MatchController>,
    ) -> Self {
        Self {
            base: RequestReceiver::new("match", exchange, registry, controller),
        }
    }

    pub fn base(&self) -> &RequestReceiver<MatchRequest, MatchResponse> {
        &self.base
    }
}

impl HttpReceiver for MatchRequestReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timing = self.base.request_timer().time();

        let (mut request, mut response) = take_pair(ctx, self.base.exchange(), (), ());
        let outcome = self.base.dispatch(ctx, &mut request, &mut response);
        restore_pair(ctx, request, response);

        match outcome {
            Outcome::Success => {}
            Outcome::Aborted => {
                ctx.response_mut().status_ok();
            }
            Outcome::Failed => {
                ctx.response_mut().reset();
            }
        }
    }

    fn name(&self) -> &'static str {
        "MatchRequestReceiver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::StatusCode;

    use crate::http::cookie::Cookie;
    use crate::http::request::HttpRequest;
    use crate::http::response::{HttpResponse, HttpResponseBuilder};
    use crate::interceptor::{FnInterceptor, Interceptor, InterceptorChain, InterceptorError};

    type MatchInterceptor = Arc<dyn Interceptor<MatchRequest, MatchResponse>>;

    fn receive(interceptors: Vec<MatchInterceptor>) -> (HttpResponse, Arc<MetricRegistry>) {
        let registry = Arc::new(MetricRegistry::new());
        let controller = Arc::new(MatchController::new("match", interceptors, &registry));
        controller.start().unwrap();
        let receiver = MatchRequestReceiver::new(Exchange::NONE, Arc::clone(&registry), controller);
        let request = HttpRequest::builder().uri("/match?google_gid=abc").build();
        let mut ctx = ReceiverContext::new(request, HttpResponseBuilder::new());
        receiver.receive(&mut ctx);
        (ctx.into_response(), registry)
    }

    fn set_uid(status: StatusCode, then_abort: bool) -> MatchInterceptor {
        Arc::new(FnInterceptor::new(
            "uid",
            move |chain: &mut InterceptorChain<'_, MatchRequest, MatchResponse>| {
                let gid = chain
                    .request()
                    .http_request()
                    .parameter("google_gid")
                    .map_err(InterceptorError::failed)?
                    .unwrap_or_default()
                    .to_string();
                let http = chain.response_mut().http_response_mut();
                http.status(status)
                    .cookie(Cookie::new("uid", gid).map_err(InterceptorError::failed)?);
                if then_abort {
                    return Err(InterceptorError::abort("already matched"));
                }
                http.redirect("https://exchange.example/match?uid=abc")
                    .map_err(InterceptorError::failed)?;
                chain.proceed()
            },
        ))
    }

    #[test]
    fn test_success_keeps_cookies_and_redirect() {
        let (response, registry) = receive(vec![set_uid(StatusCode::OK, false)]);
        assert!(response.is_redirect());
        assert_eq!(
            response.redirect_location(),
            Some("https://exchange.example/match?uid=abc")
        );
        assert_eq!(response.cookies().first("uid").map(Cookie::value), Some("abc"));
        assert_eq!(registry.meter("match.no_exchange.success-response").count(), 1);
        assert_eq!(registry.timer("match.no_exchange.request-timer").count(), 1);
    }

    #[test]
    fn test_abort_answers_ok_and_keeps_cookies() {
        let (response, registry) = receive(vec![set_uid(StatusCode::NO_CONTENT, true)]);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.cookies().contains_key("uid"));
        assert_eq!(
            registry
                .meter("match.no_exchange.interceptor-abort-exceptions")
                .count(),
            1
        );
        assert_eq!(registry.meter("match.no_exchange.success-response").count(), 0);
    }

    #[test]
    fn test_failure_discards_partial_response() {
        let failing: MatchInterceptor = Arc::new(FnInterceptor::new(
            "failing",
            |chain: &mut InterceptorChain<'_, MatchRequest, MatchResponse>| {
                chain
                    .response_mut()
                    .http_response_mut()
                    .status(StatusCode::ACCEPTED)
                    .cookie(Cookie::new("uid", "partial").map_err(InterceptorError::failed)?);
                Err(InterceptorError::failed("user store down"))
            },
        ));
        let (response, registry) = receive(vec![failing]);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.cookies().is_empty());
        assert_eq!(registry.meter("match.no_exchange.interceptor-exceptions").count(), 1);
    }
}
