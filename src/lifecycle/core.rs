//! # Lifecycle: the orchestrator over all registered services.
//!
//! [`Lifecycle`] owns the ordered set of service entries and coordinates
//! multi-service start (with strategy and rollback) and stop. One monitor
//! task per entry folds that entry's notifications into the aggregate
//! `Vec<NamedState>` and republishes the whole slice on every update, so
//! monitor subscribers always see a fully populated snapshot.
//!
//! ```text
//! register_service(cfg) ──► [entry worker]   [entry worker]   [entry worker]
//!                                │                │                │
//!                                ▼ notify         ▼                ▼
//!                           [monitor #0]     [monitor #1]     [monitor #2]
//!                                └────────────────┴────────────────┘
//!                                      fold into Vec<NamedState>
//!                                                │
//!                                                ▼
//!                                    Publisher (last-value replay)
//!                                                │
//!                                                ▼
//!                                   subscribe_monitor() sinks
//! ```
//!
//! Registration order is canonical: `start` walks it forward, `stop` and
//! rollback walk it in reverse.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, StartStrategy};
use crate::error::{Errors, HookError};
use crate::op::OpHandle;
use crate::service::{FailureSink, ServiceConfig, ServiceEntry, ServiceState, ServiceStatus};

use super::publisher::{Publisher, Subscription};
use super::state::NamedState;

/// Service lifecycle manager.
///
/// Must be used inside a tokio runtime: registration spawns the entry worker
/// and monitor tasks.
pub struct Lifecycle {
    config: Config,
    services: RwLock<Vec<Arc<ServiceEntry>>>,
    states: Arc<RwLock<Vec<NamedState>>>,
    publisher: Publisher<Vec<NamedState>>,
    done: CancellationToken,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl Lifecycle {
    pub fn new(config: Config) -> Self {
        Self {
            config: config.normalized(),
            services: RwLock::new(Vec::new()),
            states: Arc::new(RwLock::new(Vec::new())),
            publisher: Publisher::new(),
            done: CancellationToken::new(),
            monitors: Mutex::new(Vec::new()),
        }
    }

    /// Registers a service, spawning its worker and monitor task.
    ///
    /// Entries registered after `start()` has begun are not part of that pass
    /// but are included in subsequent `stop`/`close`.
    pub fn register_service(&self, cfg: ServiceConfig) {
        let mut services = self
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = services.len();
        let name = cfg.name().to_string();

        let (notify_tx, notify_rx) = mpsc::channel(1);
        services.push(Arc::new(ServiceEntry::spawn(cfg, notify_tx)));

        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(NamedState {
                id,
                name,
                status: ServiceStatus::Init,
                error: None,
            });

        let handle = tokio::spawn(Self::monitor(
            id,
            notify_rx,
            Arc::clone(&self.states),
            self.publisher.clone(),
            self.done.clone(),
        ));
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Registers a service with only a startup hook and the default restart
    /// policy.
    pub fn register_startup_hook<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(CancellationToken, FailureSink) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.register_service(ServiceConfig::new(name).on_start(hook));
    }

    /// Registers a service with only a shutdown hook and the default restart
    /// policy.
    pub fn register_shutdown_hook<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.register_service(ServiceConfig::new(name).on_stop(hook));
    }

    /// Starts every registered service in registration order under one
    /// deadline-bounded pass.
    ///
    /// Failure behavior follows [`StartStrategy`]: stop at the first failure
    /// (`FAIL_FAST`), attempt everything (`START_ALL`), and/or run a reverse
    /// rollback pass over already-attempted entries (`ROLLBACK_ON_ERROR`,
    /// skipping entries still at `Init`). All contributing errors are
    /// returned together.
    pub async fn start(&self) -> Result<(), Errors> {
        let services = self.snapshot_services();
        let op = OpHandle::with_timeout(self.config.startup_timeout);
        let strategy = self.config.start_strategy;

        let mut errs = Errors::new();
        for entry in &services {
            // Best-effort deadline check between entries, not preemptive mid-hook.
            if let Some(cause) = op.cancel_cause() {
                errs.push(cause);
                break;
            }
            if let Err(err) = entry.start(op.child()).await {
                errs.push(err);
                if strategy.contains(StartStrategy::FAIL_FAST) {
                    break;
                }
            }
        }

        if errs.is_empty() {
            return Ok(());
        }
        if strategy.contains(StartStrategy::ROLLBACK_ON_ERROR) {
            let op = OpHandle::with_timeout(self.config.shutdown_timeout);
            Self::stop_pass(&services, &op, true, &mut errs).await;
        }
        Err(errs)
    }

    /// Stops every registered service in reverse registration order under one
    /// deadline-bounded pass, accumulating errors.
    pub async fn stop(&self) -> Result<(), Errors> {
        let services = self.snapshot_services();
        let op = OpHandle::with_timeout(self.config.shutdown_timeout);
        let mut errs = Errors::new();
        Self::stop_pass(&services, &op, false, &mut errs).await;
        errs.into_result()
    }

    /// Closes every entry (waiting for in-flight work), then tears down the
    /// monitor tasks.
    pub async fn close(&self) {
        let services = self.snapshot_services();
        for entry in &services {
            entry.close().await;
        }
        self.done.cancel();
        let handles: Vec<_> = self
            .monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Snapshot of the aggregate state across all entries.
    pub fn statuses(&self) -> Vec<NamedState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribes to aggregate state updates (one immediate replay if any
    /// update was published before).
    pub fn subscribe_monitor(
        &self,
        sink: mpsc::Sender<Vec<NamedState>>,
    ) -> Subscription<Vec<NamedState>> {
        self.publisher.subscribe(sink)
    }

    async fn stop_pass(
        services: &[Arc<ServiceEntry>],
        op: &OpHandle,
        rollback: bool,
        errs: &mut Errors,
    ) {
        for entry in services.iter().rev() {
            // Rollback never touches entries the start pass did not reach.
            if rollback && entry.state().status == ServiceStatus::Init {
                continue;
            }
            if let Err(err) = entry.stop(op.child()).await {
                errs.push(err);
            }
        }
    }

    fn snapshot_services(&self) -> Vec<Arc<ServiceEntry>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn monitor(
        id: usize,
        mut notify_rx: mpsc::Receiver<ServiceState>,
        states: Arc<RwLock<Vec<NamedState>>>,
        publisher: Publisher<Vec<NamedState>>,
        done: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = done.cancelled() => return,
                next = notify_rx.recv() => {
                    let Some(state) = next else { return };
                    let aggregate = {
                        let mut guard =
                            states.write().unwrap_or_else(PoisonError::into_inner);
                        guard[id].status = state.status;
                        guard[id].error = state.error;
                        guard.clone()
                    };
                    publisher.publish(aggregate);
                }
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
