//! Receiver outcome classification and the responses each outcome yields.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::{json, Value};

use rtb_bidder::http::{Cookie, HttpReceiver, HttpRequest, HttpResponseBuilder, ReceiverContext};
use rtb_bidder::interceptor::{
    Exchange, FnInterceptor, Interceptor, InterceptorChain, InterceptorError,
};
use rtb_bidder::lifecycle::OpenRtbCodec;
use rtb_bidder::observability::metrics::MetricRegistry;
use rtb_bidder::receiver::bid::{BidController, BidRequest, BidResponse};
use rtb_bidder::receiver::{
    BidRequestReceiver, ClickRequestReceiver, ImpressionRequestReceiver,
};

mod common;

use common::{context, controller, logging, Controller, Journal, Req, Resp, Step};

type Bid = BidRequest<OpenRtbCodec>;
type BidResp = BidResponse<OpenRtbCodec>;

fn impression(
    interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
) -> (ImpressionRequestReceiver, Arc<MetricRegistry>) {
    let registry = Arc::new(MetricRegistry::new());
    let controller = controller(interceptors, &registry);
    let receiver =
        ImpressionRequestReceiver::new(Exchange::new("x"), Arc::clone(&registry), controller);
    (receiver, registry)
}

fn counts(registry: &MetricRegistry, kind: &str) -> (u64, u64, u64) {
    (
        registry.meter(&format!("{kind}.x.success-response")).count(),
        registry.meter(&format!("{kind}.x.interceptor-abort-exceptions")).count(),
        registry.meter(&format!("{kind}.x.interceptor-exceptions")).count(),
    )
}

#[test]
fn test_abort_yields_empty_response_and_one_abort_count() {
    let journal = Journal::default();
    let (receiver, registry) = impression(vec![
        logging("A", &journal, Step::Proceed),
        logging("Budget", &journal, Step::Abort),
    ]);

    let mut ctx = context(Method::GET, "/impression");
    receiver.receive(&mut ctx);

    let mut response = ctx.into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/gif"));
    assert_eq!(response.content_bytes().unwrap().len(), 43);
    assert_eq!(counts(&registry, "impression"), (0, 1, 0));
    assert_eq!(registry.timer("impression.x.request-timer").count(), 1);
}

#[test]
fn test_success_is_counted_once() {
    let journal = Journal::default();
    let (receiver, registry) = impression(vec![logging("A", &journal, Step::Proceed)]);

    for _ in 0..2 {
        let mut ctx = context(Method::GET, "/impression");
        receiver.receive(&mut ctx);
    }

    assert_eq!(counts(&registry, "impression"), (2, 0, 0));
    assert_eq!(registry.timer("impression.x.request-timer").count(), 2);
}

#[test]
fn test_errors_and_panics_count_as_other() {
    let failing: Arc<dyn Interceptor<Req, Resp>> = Arc::new(FnInterceptor::new(
        "failing",
        |_: &mut InterceptorChain<'_, Req, Resp>| Err(InterceptorError::failed("store down")),
    ));
    let (receiver, registry) = impression(vec![failing]);
    let mut ctx = context(Method::GET, "/impression");
    receiver.receive(&mut ctx);
    assert_eq!(ctx.response().status_code(), StatusCode::OK);
    assert_eq!(counts(&registry, "impression"), (0, 0, 1));

    let panicking: Arc<dyn Interceptor<Req, Resp>> = Arc::new(FnInterceptor::new(
        "panicking",
        |_: &mut InterceptorChain<'_, Req, Resp>| panic!("interceptor bug"),
    ));
    let (receiver, registry) = impression(vec![panicking]);
    let mut ctx = context(Method::GET, "/impression");
    receiver.receive(&mut ctx);
    assert_eq!(ctx.response().status_code(), StatusCode::OK);
    assert_eq!(counts(&registry, "impression"), (0, 0, 1));
}

#[test]
fn test_stopped_controller_counts_as_other() {
    let registry = Arc::new(MetricRegistry::new());
    let controller = Arc::new(Controller::new("click", Vec::new(), &registry));
    let receiver = ClickRequestReceiver::new(Exchange::new("x"), Arc::clone(&registry), controller);

    let mut ctx = context(Method::GET, "/click?url=http://adv.example");
    receiver.receive(&mut ctx);

    assert_eq!(ctx.response().status_code(), StatusCode::OK);
    assert!(ctx.response().redirect_location().is_none());
    assert_eq!(counts(&registry, "click"), (0, 0, 1));
}

fn bid_receiver(
    interceptors: Vec<Arc<dyn Interceptor<Bid, BidResp>>>,
) -> (BidRequestReceiver<OpenRtbCodec>, Arc<MetricRegistry>) {
    let registry = Arc::new(MetricRegistry::new());
    let controller = Arc::new(BidController::<OpenRtbCodec>::new("bid", interceptors, &registry));
    controller.start().unwrap();
    let receiver = BidRequestReceiver::new(
        Exchange::new("x"),
        Arc::clone(&registry),
        controller,
        OpenRtbCodec::openrtb(),
    );
    (receiver, registry)
}

fn bid_context(body: Value) -> ReceiverContext {
    let request = HttpRequest::builder()
        .method(Method::POST)
        .uri("/bid")
        .body(body.to_string())
        .build();
    ReceiverContext::new(request, HttpResponseBuilder::new())
}

#[test]
fn test_bid_response_cookies_are_dropped() {
    let cookie_setter: Arc<dyn Interceptor<Bid, BidResp>> = Arc::new(FnInterceptor::new(
        "cookies",
        |chain: &mut InterceptorChain<'_, Bid, BidResp>| {
            let response = chain.response_mut();
            response
                .http_response_mut()
                .cookie(Cookie::new("uid", "42").map_err(InterceptorError::failed)?);
            *response.native_mut() = json!({ "id": "b", "seatbid": [] });
            chain.proceed()
        },
    ));
    let (receiver, registry) = bid_receiver(vec![cookie_setter]);

    let mut ctx = bid_context(json!({ "id": "b" }));
    receiver.receive(&mut ctx);

    assert!(ctx.response().cookies().is_empty());
    let mut response = ctx.into_response();
    let body: Value = serde_json::from_str(&response.content_string().unwrap()).unwrap();
    assert_eq!(body["id"], "b");
    assert_eq!(registry.meter("bid.x.success-response-no-bids").count(), 1);
}

#[test]
fn test_bid_request_is_visible_to_interceptors() {
    let echo: Arc<dyn Interceptor<Bid, BidResp>> = Arc::new(FnInterceptor::new(
        "echo",
        |chain: &mut InterceptorChain<'_, Bid, BidResp>| {
            let imps = chain.request().native()["imp"].clone();
            let path = chain
                .request()
                .http_request()
                .path()
                .map_err(InterceptorError::failed)?
                .to_string();
            *chain.response_mut().native_mut() = json!({
                "path": path,
                "seatbid": [{ "bid": imps }],
            });
            chain.proceed()
        },
    ));
    let (receiver, registry) = bid_receiver(vec![echo]);

    let mut ctx = bid_context(json!({ "id": "e", "imp": [{ "id": "1" }] }));
    receiver.receive(&mut ctx);

    let mut response = ctx.into_response();
    let body: Value = serde_json::from_str(&response.content_string().unwrap()).unwrap();
    assert_eq!(body["path"], "/bid");
    assert_eq!(body["seatbid"][0]["bid"][0]["id"], "1");
    assert_eq!(registry.meter("bid.x.success-response-with-bids").count(), 1);
}

#[test]
fn test_empty_bid_body_is_bad_request() {
    let (receiver, registry) = bid_receiver(Vec::new());
    let mut ctx = ReceiverContext::new(
        HttpRequest::builder().method(Method::POST).uri("/bid").build(),
        HttpResponseBuilder::new(),
    );
    receiver.receive(&mut ctx);

    assert_eq!(ctx.response().status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(registry.meter("bid.x.bad-request").count(), 1);
    assert_eq!(counts(&registry, "bid"), (0, 0, 0));
}
