//! The interceptor contract and the per-request chain that drives it.
//!
//! # Execution Order
//! ```text
//! A.execute ─┬─ before
//!            ├─ chain.proceed() ──▶ B.execute ─┬─ before
//!            │                                 ├─ chain.proceed() ──▶ C ...
//!            │                                 └─ after
//!            └─ after
//! ```
//! Not calling `proceed()` ends the chain at that interceptor; everything
//! already entered still runs its post-proceed code as the stack unwinds.

use std::slice;
use std::sync::Arc;

use crate::interceptor::error::{BoxError, ChainResult};
use crate::interceptor::user::{Exchange, OnExchange};
use crate::observability::metrics::Timer;

/// A pluggable policy step over a `(Req, Resp)` pair.
pub trait Interceptor<Req, Resp>: Send + Sync {
    /// Run this step. Call `chain.proceed()` to run the rest of the chain.
    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> ChainResult;

    /// Name used for the timer and in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Exchanges this interceptor understands; `None` means all of them.
    fn compatible_exchanges(&self) -> Option<&[&'static str]> {
        None
    }

    fn start_up(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn shut_down(&self) {}
}

/// An interceptor paired with its timer.
pub(crate) struct InterceptorSlot<Req, Resp> {
    pub(crate) interceptor: Arc<dyn Interceptor<Req, Resp>>,
    pub(crate) timer: Arc<Timer>,
}

impl<Req, Resp> InterceptorSlot<Req, Resp> {
    fn accepts(&self, exchange: &Exchange) -> bool {
        self.interceptor
            .compatible_exchanges()
            .map_or(true, |names| names.iter().any(|n| *n == exchange.name()))
    }
}

/// Cursor over a controller's interceptors for one request.
pub struct InterceptorChain<'a, Req, Resp> {
    slots: slice::Iter<'a, InterceptorSlot<Req, Resp>>,
    request: &'a mut Req,
    response: &'a mut Resp,
}

impl<'a, Req, Resp> InterceptorChain<'a, Req, Resp>
where
    Req: OnExchange,
{
    pub(crate) fn new(
        slots: &'a [InterceptorSlot<Req, Resp>],
        request: &'a mut Req,
        response: &'a mut Resp,
    ) -> Self {
        Self {
            slots: slots.iter(),
            request,
            response,
        }
    }

    /// Run the next compatible interceptor, which in turn decides whether the
    /// rest of the chain runs. Returns `Ok` once the end is reached.
    pub fn proceed(&mut self) -> ChainResult {
        while let Some(slot) = self.slots.next() {
            if !slot.accepts(self.request.exchange()) {
                tracing::trace!(
                    interceptor = slot.interceptor.name(),
                    exchange = %self.request.exchange(),
                    "Skipping incompatible interceptor"
                );
                continue;
            }

            let name = slot.interceptor.name();
            tracing::debug!(">> Interceptor: {}", name);
            let result = {
                let _timing = slot.timer.time();
                slot.interceptor.execute(self)
            };
            tracing::debug!("<< Interceptor: {}", name);
            return result;
        }
        Ok(())
    }

    pub fn request(&self) -> &Req {
        &*self.request
    }

    pub fn request_mut(&mut self) -> &mut Req {
        &mut *self.request
    }

    pub fn response(&self) -> &Resp {
        &*self.response
    }

    pub fn response_mut(&mut self) -> &mut Resp {
        &mut *self.response
    }

    /// Both halves at once, for interceptors that read one while writing the other.
    pub fn parts_mut(&mut self) -> (&mut Req, &mut Resp) {
        (&mut *self.request, &mut *self.response)
    }

    /// Interceptors not yet entered (compatible or not).
    pub fn remaining(&self) -> usize {
        self.slots.len()
    }
}

/// Adapts a closure into an interceptor.
pub struct FnInterceptor<F> {
    name: &'static str,
    f: F,
}

impl<F> FnInterceptor<F> {
    pub fn new<Req, Resp>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut InterceptorChain<'_, Req, Resp>) -> ChainResult + Send + Sync,
    {
        Self { name, f }
    }
}

impl<Req, Resp, F> Interceptor<Req, Resp> for FnInterceptor<F>
where
    F: Fn(&mut InterceptorChain<'_, Req, Resp>) -> ChainResult + Send + Sync,
{
    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> ChainResult {
        (self.f)(chain)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
