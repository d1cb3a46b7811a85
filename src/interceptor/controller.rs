//! Owner of an interceptor list: lifecycle, timers, and chain creation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::interceptor::chain::{Interceptor, InterceptorChain, InterceptorSlot};
use crate::interceptor::error::{ChainResult, InterceptorError, LifecycleError};
use crate::interceptor::user::OnExchange;
use crate::lifecycle::startup::Service;
use crate::observability::metrics::MetricRegistry;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    New = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Terminated = 4,
    Failed = 5,
}

impl From<u8> for ControllerState {
    fn from(val: u8) -> Self {
        match val {
            1 => ControllerState::Starting,
            2 => ControllerState::Running,
            3 => ControllerState::Stopping,
            4 => ControllerState::Terminated,
            5 => ControllerState::Failed,
            _ => ControllerState::New,
        }
    }
}

impl ControllerState {
    fn describe(self) -> &'static str {
        match self {
            ControllerState::New => "new",
            ControllerState::Starting => "starting",
            ControllerState::Running => "running",
            ControllerState::Stopping => "stopping",
            ControllerState::Terminated => "terminated",
            ControllerState::Failed => "failed",
        }
    }
}

/// Wrap each interceptor with the shared timer for its implementation.
pub(crate) fn timed_slots<Req, Resp>(
    interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
    registry: &MetricRegistry,
) -> Vec<InterceptorSlot<Req, Resp>> {
    interceptors
        .into_iter()
        .map(|interceptor| {
            let timer = registry.timer(&MetricRegistry::name(&[interceptor.name(), "execute"]));
            InterceptorSlot { interceptor, timer }
        })
        .collect()
}

/// Runs a fixed, ordered interceptor list for every request it is given.
///
/// The list is immutable after construction and shared by all concurrent
/// chains; each request gets its own short-lived [`InterceptorChain`].
pub struct InterceptorController<Req, Resp> {
    name: String,
    slots: Vec<InterceptorSlot<Req, Resp>>,
    state: AtomicU8,
}

impl<Req, Resp> InterceptorController<Req, Resp>
where
    Req: OnExchange,
{
    pub fn new(
        name: impl Into<String>,
        interceptors: Vec<Arc<dyn Interceptor<Req, Resp>>>,
        registry: &MetricRegistry,
    ) -> Self {
        let name = name.into();
        let slots = timed_slots(interceptors, registry);
        let controller = Self {
            name,
            slots,
            state: AtomicU8::new(ControllerState::New as u8),
        };
        tracing::info!(
            controller = %controller.name,
            interceptors = ?controller.interceptor_names(),
            "Interceptors"
        );
        controller
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ControllerState {
        ControllerState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.interceptor.name()).collect()
    }

    pub fn interceptors(&self) -> impl Iterator<Item = &Arc<dyn Interceptor<Req, Resp>>> {
        self.slots.iter().map(|s| &s.interceptor)
    }

    fn transition(&self, from: ControllerState, to: ControllerState) -> Result<(), ControllerState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ControllerState::from)
    }

    /// Run every start-up hook in declaration order. Fails if not new, or if
    /// any hook fails; hooks that already ran are shut down again.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.transition(ControllerState::New, ControllerState::Starting)
            .map_err(|state| LifecycleError::IllegalState {
                controller: self.name.clone(),
                action: "start",
                state: state.describe(),
            })?;

        tracing::info!(controller = %self.name, "Starting up...");
        for (started, slot) in self.slots.iter().enumerate() {
            if let Err(source) = slot.interceptor.start_up() {
                let interceptor = slot.interceptor.name();
                tracing::error!(
                    controller = %self.name,
                    interceptor,
                    error = %source,
                    "Interceptor failed to start"
                );
                for slot in &self.slots[..started] {
                    slot.interceptor.shut_down();
                }
                self.state.store(ControllerState::Failed as u8, Ordering::Release);
                return Err(LifecycleError::StartUp {
                    interceptor,
                    source,
                });
            }
        }
        self.state.store(ControllerState::Running as u8, Ordering::Release);
        tracing::info!(controller = %self.name, "Startup complete.");
        Ok(())
    }

    /// Run every shut-down hook in declaration order. A controller that never
    /// started terminates without running hooks.
    pub fn stop(&self) {
        match self.transition(ControllerState::Running, ControllerState::Stopping) {
            Ok(()) => {
                tracing::info!(controller = %self.name, "Shutting down...");
                for slot in &self.slots {
                    slot.interceptor.shut_down();
                }
                self.state.store(ControllerState::Terminated as u8, Ordering::Release);
                tracing::info!(controller = %self.name, "Shutdown complete.");
            }
            Err(ControllerState::New) => {
                let _ = self.transition(ControllerState::New, ControllerState::Terminated);
            }
            Err(_) => {}
        }
    }

    /// Drive a fresh chain over the whole list for one request.
    pub fn on_request(&self, request: &mut Req, response: &mut Resp) -> ChainResult {
        if !self.is_running() {
            return Err(InterceptorError::NotRunning(self.name.clone()));
        }
        InterceptorChain::new(&self.slots, request, response).proceed()
    }
}

impl<Req, Resp> Service for InterceptorController<Req, Resp>
where
    Req: OnExchange,
{
    fn service_name(&self) -> &str {
        self.name()
    }

    fn start(&self) -> Result<(), LifecycleError> {
        InterceptorController::start(self)
    }

    fn stop(&self) {
        InterceptorController::stop(self)
    }

    fn is_running(&self) -> bool {
        InterceptorController::is_running(self)
    }
}
