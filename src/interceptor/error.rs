//! Interceptor outcomes and lifecycle errors.

use thiserror::Error;

use crate::http::content::ContentError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ways a chain can stop other than running to completion.
#[derive(Debug, Error)]
pub enum InterceptorError {
    /// Deliberate short-circuit: the request gets an empty, well-formed response.
    #[error("request aborted: {reason}")]
    Abort { reason: String },

    #[error("controller `{0}` is not running")]
    NotRunning(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("interceptor failed: {0}")]
    Failed(#[source] BoxError),
}

impl InterceptorError {
    pub fn abort(reason: impl Into<String>) -> Self {
        InterceptorError::Abort {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl Into<BoxError>) -> Self {
        InterceptorError::Failed(error.into())
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, InterceptorError::Abort { .. })
    }
}

pub type ChainResult = Result<(), InterceptorError>;

/// Controller lifecycle failures. Fatal at startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("controller `{controller}` cannot {action} while {state}")]
    IllegalState {
        controller: String,
        action: &'static str,
        state: &'static str,
    },

    #[error("interceptor `{interceptor}` failed to start: {source}")]
    StartUp {
        interceptor: &'static str,
        #[source]
        source: BoxError,
    },
}
