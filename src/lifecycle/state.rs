//! Orchestrator-level view of one service's state.

use std::fmt;

use crate::error::ServiceError;
use crate::service::ServiceStatus;

/// A service's state extended with its registration index and name.
///
/// The aggregate `Vec<NamedState>` published by the monitor is indexed by
/// registration order.
#[derive(Debug, Clone)]
pub struct NamedState {
    /// Registration index, assigned by `register_service`.
    pub id: usize,
    /// Caller-supplied service name (not uniqueness-enforced).
    pub name: String,
    pub status: ServiceStatus,
    pub error: Option<ServiceError>,
}

impl fmt::Display for NamedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.id, self.name, self.status)?;
        if let Some(err) = &self.error {
            write!(f, " ({err})")?;
        }
        Ok(())
    }
}
