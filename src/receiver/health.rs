//! Liveness endpoint over the managed services.

use std::sync::Arc;

use http::StatusCode;

use crate::http::receiver::{HttpReceiver, ReceiverContext};
use crate::lifecycle::startup::Service;

/// Plain-text status of every managed service; `500` if any is not running.
pub struct HealthReceiver {
    services: Vec<Arc<dyn Service>>,
}

impl HealthReceiver {
    pub fn new(services: Vec<Arc<dyn Service>>) -> Self {
        Self { services }
    }

    pub fn is_healthy(&self) -> bool {
        self.services.iter().all(|s| s.is_running())
    }
}

impl HttpReceiver for HealthReceiver {
    fn receive(&self, ctx: &mut ReceiverContext) {
        let healthy = self.is_healthy();
        let mut report = String::from(if healthy { "OK\n" } else { "UNHEALTHY\n" });
        for service in &self.services {
            let state = if service.is_running() { "running" } else { "stopped" };
            report.push_str(service.service_name());
            report.push_str(": ");
            report.push_str(state);
            report.push('\n');
        }

        let status = if healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let http = ctx.response_mut();
        http.status(status).media_type(&mime::TEXT_PLAIN_UTF_8).reset_content();
        if let Err(e) = http.print_content(&report) {
            tracing::error!(error = %e, "Failed to write health report");
        }
    }

    fn name(&self) -> &'static str {
        "HealthReceiver"
    }
}
