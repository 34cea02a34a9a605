//! # Service configuration: hooks and restart policy.
//!
//! [`ServiceConfig`] bundles a service's name, optional startup/shutdown
//! hooks, and its [`RestartPolicy`]. Hooks are function-backed, like the
//! closures the rest of the runtime is built around: each invocation produces
//! a fresh future, so hooks own their state per attempt and need no interior
//! mutability.
//!
//! ## Hook contract
//! - The **startup hook** receives a [`CancellationToken`] and a
//!   [`FailureSink`]. It must either return promptly (e.g. spawn its real work
//!   and report later crashes through the sink) or honor cancellation.
//! - The **shutdown hook** receives a [`CancellationToken`] and returns once
//!   the service is stopped.
//!
//! ## Example
//! ```
//! use servisor::{RestartPolicy, ServiceConfig};
//! use std::time::Duration;
//!
//! let cfg = ServiceConfig::new("cache-warmer")
//!     .on_start(|_token, _failures| async { Ok(()) })
//!     .on_stop(|_token| async { Ok(()) })
//!     .with_restart(RestartPolicy {
//!         on_failure: true,
//!         delay: Duration::from_millis(200),
//!         limit: 3,
//!     });
//! assert_eq!(cfg.name(), "cache-warmer");
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::HookError;

/// Write-only channel a startup hook uses to report a crash after a
/// successful start.
pub type FailureSink = mpsc::Sender<HookError>;

type BoxHookFuture = BoxFuture<'static, Result<(), HookError>>;

pub(crate) type StartupFn =
    Arc<dyn Fn(CancellationToken, FailureSink) -> BoxHookFuture + Send + Sync>;
pub(crate) type ShutdownFn = Arc<dyn Fn(CancellationToken) -> BoxHookFuture + Send + Sync>;

/// Rules governing restart on runtime failure.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    /// Whether to restart at all after a runtime failure.
    pub on_failure: bool,
    /// Minimum delay between consecutive restart attempts (`0` = no throttling).
    pub delay: Duration,
    /// Maximum number of restart attempts (`0` = unlimited).
    pub limit: u32,
}

impl Default for RestartPolicy {
    /// Restart enabled, 4 attempts, 100ms between attempts.
    fn default() -> Self {
        Self {
            on_failure: true,
            delay: Duration::from_millis(100),
            limit: 4,
        }
    }
}

impl RestartPolicy {
    /// Policy that never restarts.
    pub fn never() -> Self {
        Self {
            on_failure: false,
            delay: Duration::ZERO,
            limit: 0,
        }
    }
}

/// Immutable, caller-supplied service description.
///
/// The name is used for identification and logging only; uniqueness is not
/// enforced.
#[derive(Clone)]
pub struct ServiceConfig {
    name: String,
    startup: Option<StartupFn>,
    shutdown: Option<ShutdownFn>,
    restart: RestartPolicy,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            startup: None,
            shutdown: None,
            restart: RestartPolicy::default(),
        }
    }

    /// Sets the startup hook.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken, FailureSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.startup = Some(Arc::new(move |token, sink| Box::pin(f(token, sink))));
        self
    }

    /// Sets the shutdown hook.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.shutdown = Some(Arc::new(move |token| Box::pin(f(token))));
        self
    }

    /// Overrides the restart policy.
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }

    pub(crate) fn startup_hook(&self) -> Option<&StartupFn> {
        self.startup.as_ref()
    }

    pub(crate) fn shutdown_hook(&self) -> Option<&ShutdownFn> {
        self.shutdown.as_ref()
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("name", &self.name)
            .field("startup", &self.startup.is_some())
            .field("shutdown", &self.shutdown.is_some())
            .field("restart", &self.restart)
            .finish()
    }
}
