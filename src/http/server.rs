//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app with a single fallback handler
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Convert each request into an [`HttpRequest`] and run the bid router
//! - Render the built [`HttpResponse`], cookies included
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::BidderConfig;
use crate::http::cookie::Cookie;
use crate::http::receiver::ReceiverContext;
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, HttpResponseBuilder};
use crate::routing::Router as BidRouter;

/// Application state injected into the handler.
#[derive(Clone)]
struct AppState {
    router: Arc<BidRouter>,
    max_body_size: usize,
}

/// HTTP front end for the bid router.
pub struct HttpServer {
    app: axum::Router,
}

impl HttpServer {
    pub fn new(router: Arc<BidRouter>, config: &BidderConfig) -> Self {
        let state = AppState {
            router,
            max_body_size: config.security.max_body_size,
        };
        Self {
            app: Self::build_app(config, state),
        }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &BidderConfig, state: AppState) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_millis(config.timeouts.request_ms)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The underlying app, for driving requests without a socket.
    pub fn into_app(self) -> axum::Router {
        self.app
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request lands here; the bid router does all matching.
async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut builder = HttpRequest::builder();
    builder
        .method(parts.method)
        .version(parts.version)
        .parsed_uri(parts.uri)
        .body(bytes);
    if let Some(addr) = remote {
        builder.remote_addr(addr);
    }
    for value in parts.headers.get_all(header::COOKIE) {
        if let Ok(text) = value.to_str() {
            for cookie in Cookie::parse_header(text) {
                builder.cookie(cookie);
            }
        }
    }
    builder.headers(parts.headers);

    let mut ctx = ReceiverContext::new(builder.build(), HttpResponseBuilder::new());
    state.router.receive(&mut ctx);
    render(ctx.into_response())
}

fn render(mut response: HttpResponse) -> Response {
    let body = match response.content_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read response content");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut rendered = Response::new(Body::from(body));
    *rendered.status_mut() = response.status();
    *rendered.headers_mut() = response.headers().clone();
    for cookie in response.cookies().values() {
        match HeaderValue::from_str(&cookie.to_set_cookie()) {
            Ok(value) => {
                rendered.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %cookie.name(), "Dropping unrenderable cookie"),
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    use crate::http::receiver::HttpReceiver;
    use crate::routing::Route;

    fn app(receiver: Arc<dyn HttpReceiver>) -> axum::Router {
        let router = BidRouter::builder()
            .route(Route::new("echo", [http::Method::POST], "/echo", receiver, []))
            .build()
            .unwrap();
        HttpServer::new(Arc::new(router), &BidderConfig::default()).into_app()
    }

    #[tokio::test]
    async fn test_request_and_response_are_converted() {
        let echo: Arc<dyn HttpReceiver> = Arc::new(|ctx: &mut ReceiverContext| {
            let body = ctx.request_mut().content_reader().unwrap().read_to_string().unwrap();
            let session = ctx.request().cookie("session").map(|c| c.value().to_string());
            let response = ctx.response_mut();
            response.cookie(Cookie::new("seen", session.unwrap_or_default()).unwrap());
            response.print_content(&body.to_uppercase()).unwrap();
        });

        let request = http::Request::builder()
            .method("POST")
            .uri("/echo")
            .header(header::COOKIE, "session=abc; other=1")
            .body(Body::from("hello"))
            .unwrap();
        let response = app(echo).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()[header::SET_COOKIE], "seen=abc");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"HELLO");
    }

    #[tokio::test]
    async fn test_fallbacks_are_served_by_router() {
        let noop: Arc<dyn HttpReceiver> = Arc::new(|_: &mut ReceiverContext| {});
        let app = app(noop);

        let missing = http::Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let wrong = http::Request::builder().uri("/echo").body(Body::empty()).unwrap();
        let response = app.oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "OPTIONS, POST");
    }
}
