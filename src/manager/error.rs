use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Reconciliation pass timed out after {duration:?}")]
    TickTimeout { duration: Duration },

    #[error("Reconciliation task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("Health server failed to start on {address}: {reason}")]
    HealthServerStartFailed {
        address: String,
        reason: String,
        #[source]
        source: std::io::Error,
    },
}

impl ManagerError {
    pub fn tick_timeout(duration: Duration) -> Self {
        Self::TickTimeout { duration }
    }

    pub fn task_failed(reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            reason: reason.into(),
        }
    }

    pub fn health_server_start_failed(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::HealthServerStartFailed {
            address: address.into(),
            reason: source.to_string(),
            source,
        }
    }
}
