//! Service status enumeration and the per-transition state value.

use std::fmt;

use crate::error::ServiceError;

/// Current status of a service.
///
/// Only the pairs listed in the transition table have handlers; any other
/// requested pair is applied silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceStatus {
    /// Registered, never started.
    #[default]
    Init,
    /// Startup hook in progress.
    Starting,
    /// Started successfully.
    Running,
    /// Shutdown hook in progress.
    Stopping,
    /// Stopped cleanly.
    Stopped,
    /// Failed; see the accompanying error.
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Init => "init",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus optional error, produced on every applied transition.
///
/// Status and error are always written together under the entry's state lock;
/// observers never see a half-updated value.
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    pub status: ServiceStatus,
    pub error: Option<ServiceError>,
}

impl ServiceState {
    /// State with the given status and no error.
    pub fn new(status: ServiceStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    /// `Error` state carrying a cause.
    pub fn failed(err: ServiceError) -> Self {
        Self {
            status: ServiceStatus::Error,
            error: Some(err),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ServiceStatus::Error
    }
}
