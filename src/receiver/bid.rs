//! Bid request receiver and the codec seam for exchange wire formats.

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;
use mime::Mime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::content::ContentError;
use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::http::request::HttpRequest;
use crate::interceptor::{Exchange, InterceptorController, UserRequest, UserResponse};
use crate::observability::metrics::{Meter, MetricRegistry};
use crate::receiver::pool::BufferPool;
use crate::receiver::{restore_pair, take_pair, Outcome, RequestReceiver};

/// A bid request that could not be turned into the native model.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty bid request body")]
    Empty,

    #[error("malformed bid request: {0}")]
    Malformed(String),

    #[error("failed to read bid request body: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Translation between one exchange's wire format and its native bid model.
pub trait BidCodec: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Default + Send + 'static;

    fn media_type(&self) -> Mime;

    fn decode(&self, body: &[u8], request: &HttpRequest) -> Result<Self::Request, DecodeError>;

    fn encode(
        &self,
        request: &Self::Request,
        response: &Self::Response,
        out: &mut dyn Write,
    ) -> io::Result<()>;

    /// Ping requests are answered with an empty response without running the chain.
    fn is_ping(&self, _request: &Self::Request) -> bool {
        false
    }

    fn has_bids(&self, response: &Self::Response) -> bool;

    /// The well-formed empty response sent for pings, aborts and failures.
    fn no_bid(&self, _request: &Self::Request) -> Self::Response {
        Self::Response::default()
    }
}

pub type BidRequest<C> = UserRequest<<C as BidCodec>::Request>;
pub type BidResponse<C> = UserResponse<<C as BidCodec>::Response>;
pub type BidController<C> = InterceptorController<BidRequest<C>, BidResponse<C>>;

/// JSON over any serde model.
pub struct JsonCodec<Req, Resp> {
    ping: fn(&Req) -> bool,
    bids: fn(&Resp) -> bool,
    no_bid: fn(&Req) -> Resp,
    _model: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req, Resp: Default> JsonCodec<Req, Resp> {
    pub fn new(bids: fn(&Resp) -> bool) -> Self {
        Self {
            ping: |_| false,
            bids,
            no_bid: |_| Resp::default(),
            _model: PhantomData,
        }
    }

    pub fn with_ping(mut self, ping: fn(&Req) -> bool) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_no_bid(mut self, no_bid: fn(&Req) -> Resp) -> Self {
        self.no_bid = no_bid;
        self
    }
}

impl JsonCodec<Value, Value> {
    /// Untyped OpenRTB: ping is `"is_ping": true`, bids are a non-empty `seatbid`,
    /// and a no-bid is a BidResponse echoing the request id with no seats.
    pub fn openrtb() -> Self {
        Self::new(|response| {
            response
                .get("seatbid")
                .and_then(Value::as_array)
                .is_some_and(|seats| !seats.is_empty())
        })
        .with_ping(|request| request.get("is_ping").and_then(Value::as_bool) == Some(true))
        .with_no_bid(|request| match request.get("id") {
            Some(id) => serde_json::json!({ "id": id }),
            None => Value::Object(serde_json::Map::new()),
        })
    }
}

impl<Req, Resp> BidCodec for JsonCodec<Req, Resp>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Default + Send + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn media_type(&self) -> Mime {
        mime::APPLICATION_JSON
    }

    fn decode(&self, body: &[u8], _request: &HttpRequest) -> Result<Req, DecodeError> {
        if body.is_empty() {
            return Err(DecodeError::Empty);
        }
        serde_json::from_slice(body).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    fn encode(&self, _request: &Req, response: &Resp, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(out, response).map_err(io::Error::from)
    }

    fn is_ping(&self, request: &Req) -> bool {
        (self.ping)(request)
    }

    fn has_bids(&self, response: &Resp) -> bool {
        (self.bids)(response)
    }

    fn no_bid(&self, request: &Req) -> Resp {
        (self.no_bid)(request)
    }
}

/// Decodes bid requests, runs the bid chain, encodes the native response.
pub struct BidRequestReceiver<C: BidCodec> {
    base: RequestReceiver<BidRequest<C>, BidResponse<C>>,
    codec: C,
    buffers: BufferPool,
    with_bids: Arc<Meter>,
    no_bids: Arc<Meter>,
    bad_request: Arc<Meter>,
    ping: Arc<Meter>,
}

impl<C: BidCodec> BidRequestReceiver<C> {
    pub fn new(
        exchange: Exchange,
        registry: Arc<MetricRegistry>,
        controller: Arc<BidController<C>>,
        codec: C,
    ) -> Self {
        let base = RequestReceiver::new("bid", exchange, registry, controller);
        let with_bids = base.build_meter("success-response-with-bids");
        let no_bids = base.build_meter("success-response-no-bids");
        let bad_request = base.build_meter("bad-request");
        let ping = base.build_meter("ping");
        Self {
            base,
            codec,
            buffers: BufferPool::default(),
            with_bids,
            no_bids,
            bad_request,
            ping,
        }
    }

    pub fn base(&self) -> &RequestReceiver<BidRequest<C>, BidResponse<C>> {
        &self.base
    }

    fn read_body(ctx: &mut ReceiverContext, body: &mut Vec<u8>) -> Result<(), DecodeError> {
        ctx.request_mut().content()?.read_to_end(body)?;
        Ok(())
    }

    fn decode(&self, ctx: &mut ReceiverContext) -> Result<C::Request, DecodeError> {
        let mut body = self.buffers.acquire();
        Self::read_body(ctx, &mut body)?;
        self.codec.decode(&body, ctx.request())
    }

    fn write_response(
        &self,
        ctx: &mut ReceiverContext,
        request: &C::Request,
        response: &C::Response,
    ) {
        let mut encoded = self.buffers.acquire();
        let written = self
            .codec
            .encode(request, response, &mut *encoded)
            .and_then(|()| {
                let out = ctx.response_mut().reset_content().content().map_err(io::Error::other)?;
                out.write_all(&encoded)
            });

        match written {
            Ok(()) => {
                ctx.response_mut()
                    .status_ok()
                    .media_type(&self.codec.media_type());
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    exchange = %self.base.exchange(),
                    error = %e,
                    "Failed to write bid response"
                );
                ctx.response_mut()
                    .reset_content()
                    .status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

impl<C: BidCodec> HttpReceiver for BidRequestReceiver<C> {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let _timing = self.base.request_timer().time();

        let native = match self.decode(ctx) {
            Ok(native) => native,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    exchange = %self.base.exchange(),
                    error = %e,
                    "Bad bid request"
                );
                self.bad_request.mark();
                ctx.response_mut().reset_content().status(StatusCode::BAD_REQUEST);
                return;
            }
        };

        if self.codec.is_ping(&native) {
            self.ping.mark();
            let empty = self.codec.no_bid(&native);
            self.write_response(ctx, &native, &empty);
            return;
        }

        let (mut request, mut response) =
            take_pair(ctx, self.base.exchange(), native, C::Response::default());
        let outcome = self.base.dispatch(ctx, &mut request, &mut response);
        self.base.dont_set_cookies(ctx, response.http_response_mut());
        let (native, mut native_response) = restore_pair(ctx, request, response);

        match outcome {
            Outcome::Success => {
                if self.codec.has_bids(&native_response) {
                    self.with_bids.mark();
                } else {
                    self.no_bids.mark();
                }
            }
            Outcome::Aborted | Outcome::Failed => {
                ctx.response_mut().reset();
                native_response = self.codec.no_bid(&native);
            }
        }
        self.write_response(ctx, &native, &native_response);
    }

    fn name(&self) -> &'static str {
        "BidRequestReceiver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::http::response::HttpResponseBuilder;
    use crate::interceptor::{FnInterceptor, Interceptor, InterceptorChain, InterceptorError};

    type Codec = JsonCodec<Value, Value>;

    fn receiver(
        interceptors: Vec<Arc<dyn Interceptor<BidRequest<Codec>, BidResponse<Codec>>>>,
    ) -> (BidRequestReceiver<Codec>, Arc<MetricRegistry>) {
        let registry = Arc::new(MetricRegistry::new());
        let controller = Arc::new(BidController::<Codec>::new("bid", interceptors, &registry));
        controller.start().unwrap();
        let receiver = BidRequestReceiver::new(
            Exchange::new("test"),
            Arc::clone(&registry),
            controller,
            Codec::openrtb(),
        );
        (receiver, registry)
    }

    fn context(body: &str) -> ReceiverContext {
        let request = HttpRequest::builder()
            .method(http::Method::POST)
            .uri("/bid")
            .body(body.to_string())
            .build();
        ReceiverContext::new(request, HttpResponseBuilder::new())
    }

    fn bidder() -> Arc<dyn Interceptor<BidRequest<Codec>, BidResponse<Codec>>> {
        Arc::new(FnInterceptor::new(
            "bidder",
            |chain: &mut InterceptorChain<'_, BidRequest<Codec>, BidResponse<Codec>>| {
                let id = chain.request().native()["id"].clone();
                *chain.response_mut().native_mut() =
                    json!({ "id": id, "seatbid": [{ "bid": [{ "price": 1.5 }] }] });
                chain.proceed()
            },
        ))
    }

    #[test]
    fn test_bid_is_encoded_and_counted_with_bids() {
        let (receiver, registry) = receiver(vec![bidder()]);
        let mut ctx = context(r#"{"id":"r1"}"#);
        receiver.receive(&mut ctx);

        let mut response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(&response.content_string().unwrap()).unwrap();
        assert_eq!(body["id"], "r1");
        assert_eq!(registry.meter("bid.test.success-response").count(), 1);
        assert_eq!(registry.meter("bid.test.success-response-with-bids").count(), 1);
        assert_eq!(registry.meter("bid.test.success-response-no-bids").count(), 0);
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        let (receiver, registry) = receiver(vec![bidder()]);
        let mut ctx = context("{not json");
        receiver.receive(&mut ctx);

        assert_eq!(ctx.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(registry.meter("bid.test.bad-request").count(), 1);
        assert_eq!(registry.meter("bid.test.success-response").count(), 0);
        assert_eq!(registry.meter("bid.test.interceptor-exceptions").count(), 0);
    }

    #[test]
    fn test_ping_bypasses_chain() {
        let (receiver, registry) = receiver(vec![bidder()]);
        let mut ctx = context(r#"{"id":"p","is_ping":true}"#);
        receiver.receive(&mut ctx);

        let mut response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.content_string().unwrap(), r#"{"id":"p"}"#);
        assert_eq!(registry.meter("bid.test.ping").count(), 1);
        assert_eq!(registry.timer("bidder.execute").count(), 0);
    }

    #[test]
    fn test_abort_writes_empty_bid_response() {
        let abort: Arc<dyn Interceptor<BidRequest<Codec>, BidResponse<Codec>>> =
            Arc::new(FnInterceptor::new(
                "abort",
                |chain: &mut InterceptorChain<'_, BidRequest<Codec>, BidResponse<Codec>>| {
                    chain
                        .response_mut()
                        .http_response_mut()
                        .text_header("x-partial", "1")
                        .map_err(InterceptorError::failed)?
                        .status(StatusCode::ACCEPTED);
                    Err(InterceptorError::abort("no budget"))
                },
            ));
        let (receiver, registry) = receiver(vec![abort, bidder()]);
        let mut ctx = context(r#"{"id":"r2"}"#);
        receiver.receive(&mut ctx);

        let mut response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.header("x-partial").is_none());
        let body: Value = serde_json::from_str(&response.content_string().unwrap()).unwrap();
        assert_eq!(body, json!({ "id": "r2" }));
        assert_eq!(registry.meter("bid.test.interceptor-abort-exceptions").count(), 1);
        assert_eq!(registry.meter("bid.test.success-response").count(), 0);
        assert_eq!(registry.meter("bid.test.interceptor-exceptions").count(), 0);
    }

    #[test]
    fn test_failure_discards_partial_response() {
        let failing: Arc<dyn Interceptor<BidRequest<Codec>, BidResponse<Codec>>> =
            Arc::new(FnInterceptor::new(
                "failing",
                |chain: &mut InterceptorChain<'_, BidRequest<Codec>, BidResponse<Codec>>| {
                    *chain.response_mut().native_mut() = json!({ "seatbid": [{ "bid": [] }] });
                    chain
                        .response_mut()
                        .http_response_mut()
                        .text_header("cache-control", "max-age=60")
                        .map_err(InterceptorError::failed)?;
                    Err(InterceptorError::failed("pricing store unavailable"))
                },
            ));
        let (receiver, registry) = receiver(vec![failing]);
        let mut ctx = context(r#"{"imp":[]}"#);
        receiver.receive(&mut ctx);

        let mut response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.header("cache-control").is_none());
        assert_eq!(response.content_string().unwrap(), "{}");
        assert_eq!(registry.meter("bid.test.interceptor-exceptions").count(), 1);
        assert_eq!(registry.meter("bid.test.success-response-with-bids").count(), 0);
    }

    #[test]
    fn test_no_bids_when_chain_leaves_default() {
        let (receiver, registry) = receiver(Vec::new());
        let mut ctx = context(r#"{"id":"r3"}"#);
        receiver.receive(&mut ctx);

        assert_eq!(ctx.into_response().status(), StatusCode::OK);
        assert_eq!(registry.meter("bid.test.success-response-no-bids").count(), 1);
        assert_eq!(registry.timer("bid.test.request-timer").count(), 1);
    }
}
