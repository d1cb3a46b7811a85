//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rtb_bidder::http::{HttpRequest, HttpResponseBuilder, ReceiverContext};
use rtb_bidder::interceptor::{
    ChainResult, Exchange, Interceptor, InterceptorChain, InterceptorController, InterceptorError,
    UserRequest, UserResponse,
};
use rtb_bidder::lifecycle::StartupError;
use rtb_bidder::observability::metrics::MetricRegistry;
use rtb_bidder::{Bidder, BidderConfig, Interceptors, Shutdown};

pub type Req = UserRequest;
pub type Resp = UserResponse;
pub type Controller = InterceptorController<Req, Resp>;

/// Records the order interceptors run in.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// What an interceptor does after logging "before".
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Proceed,
    Stop,
    Abort,
}

pub struct Logging {
    pub name: &'static str,
    pub journal: Journal,
    pub step: Step,
}

impl Interceptor<Req, Resp> for Logging {
    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> ChainResult {
        self.journal.record(format!("{}-before", self.name));
        match self.step {
            Step::Proceed => chain.proceed()?,
            Step::Stop => {}
            Step::Abort => return Err(InterceptorError::abort(self.name)),
        }
        self.journal.record(format!("{}-after", self.name));
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub fn logging(name: &'static str, journal: &Journal, step: Step) -> Arc<dyn Interceptor<Req, Resp>> {
    Arc::new(Logging {
        name,
        journal: journal.clone(),
        step,
    })
}

/// A started controller over `interceptors`.
pub fn controller(
    interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
    registry: &MetricRegistry,
) -> Arc<Controller> {
    let controller = Arc::new(Controller::new("test", interceptors, registry));
    controller.start().unwrap();
    controller
}

pub fn pair(exchange: Exchange) -> (Req, Resp) {
    (
        UserRequest::new(exchange.clone(), HttpRequest::default(), ()),
        UserResponse::new(exchange, HttpResponseBuilder::new(), ()),
    )
}

pub fn context(method: http::Method, uri: &str) -> ReceiverContext {
    let request = HttpRequest::builder().method(method).uri(uri).build();
    ReceiverContext::new(request, HttpResponseBuilder::new())
}

/// A running bidder on an ephemeral port.
pub struct TestBidder {
    pub addr: SocketAddr,
    pub registry: Arc<MetricRegistry>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), StartupError>>,
}

impl TestBidder {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) -> Result<(), StartupError> {
        self.shutdown.trigger();
        self.handle.await.unwrap()
    }
}

pub async fn start_bidder(mut config: BidderConfig, interceptors: Interceptors) -> TestBidder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let bidder = Bidder::build(config, interceptors).unwrap();
    let registry = Arc::clone(bidder.registry());
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(bidder.serve(listener, shutdown.clone()));

    TestBidder {
        addr,
        registry,
        shutdown,
        handle,
    }
}
