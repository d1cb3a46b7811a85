//! Receivers the router uses when no declared route applies.

use http::header::{self, HeaderValue};
use http::{Method, StatusCode};

use crate::http::receiver::{HttpReceiver, ReceiverContext};

/// Request attribute carrying the methods registered for the matched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethods(pub Vec<Method>);

impl AllowedMethods {
    pub fn contains(&self, method: &Method) -> bool {
        self.0.contains(method)
    }

    /// Value for an `Allow` header.
    pub fn header_value(&self) -> String {
        self.0.iter().map(Method::as_str).collect::<Vec<_>>().join(", ")
    }
}

fn set_allow(ctx: &mut ReceiverContext) {
    let allow = ctx
        .attributes()
        .get::<AllowedMethods>()
        .map(AllowedMethods::header_value);
    if let Some(value) = allow.and_then(|v| HeaderValue::from_str(&v).ok()) {
        ctx.response_mut().set_header(header::ALLOW, value);
    }
}

/// Answers OPTIONS with `200` and an `Allow` header.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionsReceiver;

impl HttpReceiver for OptionsReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        set_allow(ctx);
        ctx.response_mut().status_ok();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotFoundReceiver;

impl HttpReceiver for NotFoundReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        ctx.response_mut().status(StatusCode::NOT_FOUND);
    }
}

/// Answers `405` with the methods the path does accept.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodNotAllowedReceiver;

impl HttpReceiver for MethodNotAllowedReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        set_allow(ctx);
        ctx.response_mut().status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
