//! An interceptor that runs its own private chain of components.
//!
//! ```text
//! parent:   A ──▶ [ Composite ] ──▶ D
//!                    │
//! private:           └─ B ──▶ C
//! ```
//! The private chain runs to completion (or until a component stops
//! proceeding), then the parent continues. Errors from the private chain,
//! aborts included, propagate to the parent.

use std::sync::Arc;

use crate::interceptor::chain::{Interceptor, InterceptorChain, InterceptorSlot};
use crate::interceptor::controller::timed_slots;
use crate::interceptor::error::{BoxError, ChainResult};
use crate::interceptor::user::OnExchange;
use crate::observability::metrics::MetricRegistry;

pub struct CompositeInterceptor<Req, Resp> {
    name: &'static str,
    components: Vec<InterceptorSlot<Req, Resp>>,
}

impl<Req, Resp> CompositeInterceptor<Req, Resp> {
    /// Components are timed individually, like top-level interceptors.
    pub fn new(
        name: &'static str,
        components: Vec<Arc<dyn Interceptor<Req, Resp>>>,
        registry: &MetricRegistry,
    ) -> Self {
        Self {
            name,
            components: timed_slots(components, registry),
        }
    }

    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.iter().map(|s| s.interceptor.name()).collect()
    }
}

impl<Req, Resp> Interceptor<Req, Resp> for CompositeInterceptor<Req, Resp>
where
    Req: OnExchange,
{
    fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> ChainResult {
        {
            let (request, response) = chain.parts_mut();
            InterceptorChain::new(&self.components, request, response).proceed()?;
        }
        chain.proceed()
    }

    fn name(&self) -> &'static str {
        self.name
    }

    /// Components that started before a failing one are shut down again.
    fn start_up(&self) -> Result<(), BoxError> {
        for (started, slot) in self.components.iter().enumerate() {
            if let Err(source) = slot.interceptor.start_up() {
                for slot in &self.components[..started] {
                    slot.interceptor.shut_down();
                }
                return Err(source);
            }
        }
        Ok(())
    }

    fn shut_down(&self) {
        for slot in &self.components {
            slot.interceptor.shut_down();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::interceptor::controller::{ControllerState, InterceptorController};
    use crate::interceptor::user::{UserRequest, UserResponse};

    type Req = UserRequest;
    type Resp = UserResponse;

    struct Hooked {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    impl Interceptor<Req, Resp> for Hooked {
        fn execute(&self, chain: &mut InterceptorChain<'_, Req, Resp>) -> ChainResult {
            chain.proceed()
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn start_up(&self) -> Result<(), BoxError> {
            self.log.lock().unwrap().push(format!("start {}", self.name));
            if self.fail_start {
                return Err(format!("{} unavailable", self.name).into());
            }
            Ok(())
        }

        fn shut_down(&self) {
            self.log.lock().unwrap().push(format!("stop {}", self.name));
        }
    }

    fn hooked(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    ) -> Arc<dyn Interceptor<Req, Resp>> {
        Arc::new(Hooked {
            name,
            log: Arc::clone(log),
            fail_start,
        })
    }

    #[test]
    fn test_failed_component_start_shuts_down_started_components() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = MetricRegistry::new();
        let composite = CompositeInterceptor::new(
            "Composite",
            vec![hooked("a", &log, false), hooked("b", &log, true), hooked("c", &log, false)],
            &registry,
        );

        let err = composite.start_up().unwrap_err();
        assert_eq!(err.to_string(), "b unavailable");
        assert_eq!(*log.lock().unwrap(), vec!["start a", "start b", "stop a"]);
    }

    #[test]
    fn test_nested_failure_leaves_nothing_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = MetricRegistry::new();
        let composite: Arc<dyn Interceptor<Req, Resp>> = Arc::new(CompositeInterceptor::new(
            "Composite",
            vec![hooked("b", &log, false), hooked("c", &log, true)],
            &registry,
        ));
        let controller = InterceptorController::new(
            "test",
            vec![hooked("a", &log, false), composite, hooked("d", &log, false)],
            &registry,
        );

        assert!(controller.start().is_err());
        assert_eq!(controller.state(), ControllerState::Failed);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start a", "start b", "start c", "stop b", "stop a"]
        );
    }
}
