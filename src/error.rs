//! Error types used by the lifecycle runtime and services.
//!
//! This module defines:
//!
//! - [`ServiceError`]: failures recorded into a service's state and returned
//!   from `start`/`stop` on a single entry.
//! - [`Errors`]: a combined multi-error accumulated by the orchestrator over
//!   several entries (start pass, rollback pass, stop pass).
//!
//! [`ServiceError`] is `Clone` (the same value lives in the entry's state and
//! in every notification), so hook failures are stored behind an `Arc`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by user-supplied hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Phase a hook failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Startup hook returned an error.
    Startup,
    /// Shutdown hook returned an error.
    Shutdown,
    /// Failure reported through the failure sink after a successful start.
    Runtime,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookPhase::Startup => "startup",
            HookPhase::Shutdown => "shutdown",
            HookPhase::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

/// # Failures recorded by a service entry.
///
/// These end up in [`ServiceState::error`](crate::ServiceState) and are
/// returned to `start`/`stop` callers when the final observed status is
/// `Error`.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// A user-supplied hook returned an error, wrapped with the failing phase.
    #[error("{phase} hook failed: {source}")]
    Hook {
        /// Which phase failed.
        phase: HookPhase,
        /// The underlying hook error.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A deadline elapsed while waiting for a transition or a restart backoff.
    #[error("deadline exceeded after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// The operation handle was cancelled.
    #[error("operation canceled")]
    Canceled,

    /// The entry was closed while a restart wait was pending.
    #[error("service closed")]
    Closed,
}

impl ServiceError {
    /// Wraps a hook error with its phase.
    pub fn hook(phase: HookPhase, err: HookError) -> Self {
        ServiceError::Hook {
            phase,
            source: Arc::from(err),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Hook {
                phase: HookPhase::Startup,
                ..
            } => "startup_hook_failed",
            ServiceError::Hook {
                phase: HookPhase::Shutdown,
                ..
            } => "shutdown_hook_failed",
            ServiceError::Hook {
                phase: HookPhase::Runtime,
                ..
            } => "runtime_failure",
            ServiceError::Timeout { .. } => "deadline_exceeded",
            ServiceError::Canceled => "canceled",
            ServiceError::Closed => "service_closed",
        }
    }

    /// Returns the underlying hook error, if this is a hook failure.
    ///
    /// Useful for downcasting to the concrete error a hook returned:
    ///
    /// ```
    /// # use servisor::{HookPhase, ServiceError};
    /// let err = ServiceError::hook(HookPhase::Startup, "boom".into());
    /// assert!(err.hook_source().is_some());
    /// ```
    pub fn hook_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ServiceError::Hook { source, .. } => Some(&**source),
            _ => None,
        }
    }

    /// True for cancellation-shaped causes (timeout or explicit cancel).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ServiceError::Timeout { .. } | ServiceError::Canceled)
    }
}

/// Combined error set accumulated over multiple services.
///
/// `start`/`stop` on the orchestrator attempt every entry the strategy allows
/// and report all failures at once. Rollback errors are appended after the
/// errors that triggered the rollback.
#[derive(Debug, Clone, Default)]
pub struct Errors {
    errors: Vec<ServiceError>,
}

impl Errors {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one contributing error.
    pub fn push(&mut self, err: ServiceError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates contributing errors in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceError> {
        self.errors.iter()
    }

    /// `Ok(())` if empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Errors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("no errors");
        }
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl From<ServiceError> for Errors {
    fn from(err: ServiceError) -> Self {
        Self { errors: vec![err] }
    }
}
