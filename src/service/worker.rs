//! # Service worker: the single drain loop behind one entry.
//!
//! Exactly one worker task exists per [`ServiceEntry`](super::ServiceEntry);
//! it owns the transition queue and is the only executor of transition
//! handlers, so "at most one active transition per service" holds by
//! construction. Requests reach it over two channels:
//!
//! ```text
//! start/stop ──► command channel ──┐
//!                                  ├──► worker: push target ─► drain()
//! startup hook ─► failure channel ─┘
//!
//! drain() {
//!   loop {
//!     ├─► current op cancelled?  → store Error(cause), abandon queue, exit
//!     ├─► pop next requested state (exit when empty)
//!     ├─► store it as current state (status + error together)
//!     ├─► run the matching transition handler, if any
//!     │     └─ handler failure → enqueue Error(cause)
//!     └─► deliver applied state to the notification sink (blocking)
//!   }
//! }
//! ```
//!
//! Handlers may enqueue follow-up transitions (`Starting` → startup hook →
//! `Running`), which the same drain pass applies before the caller's
//! acknowledgement is sent.
//!
//! ## Rules
//! - Hook invocations race the current op token; on cancellation the hook
//!   future is dropped and the cancellation cause becomes the handler error.
//! - Queued-but-unprocessed requests are abandoned when an op is cancelled or
//!   times out mid-drain.
//! - The restart evaluator's backoff wait races timer / op cancel / close.
//! - Close stops notification delivery, not application: states already
//!   queued (such as the `Closed` failure from an aborted backoff wait) are
//!   applied before the worker exits.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{HookError, HookPhase, ServiceError};
use crate::op::{OpHandle, OpSlot};

use super::config::{FailureSink, ServiceConfig};
use super::queue::TransitionQueue;
use super::status::{ServiceState, ServiceStatus};

/// External request to apply a transition, acknowledged with the final state
/// once the drain pass it triggered has finished.
pub(crate) struct Command {
    pub target: ServiceState,
    pub done: oneshot::Sender<ServiceState>,
}

/// Restart accounting, created lazily on first runtime failure.
///
/// Counters are never reset: a later failure after a long healthy period is
/// still counted against the policy's limit.
#[derive(Debug, Clone, Copy, Default)]
struct RestartState {
    try_count: u32,
    last_attempt: Option<Instant>,
}

pub(crate) struct Worker {
    pub cfg: ServiceConfig,
    pub state: Arc<RwLock<ServiceState>>,
    pub queue: TransitionQueue,
    pub ops: Arc<OpSlot>,
    pub notify: mpsc::Sender<ServiceState>,
    pub cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub fail_rx: mpsc::Receiver<HookError>,
    pub fail_tx: FailureSink,
    pub close: CancellationToken,
    restart: Option<RestartState>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: ServiceConfig,
        state: Arc<RwLock<ServiceState>>,
        ops: Arc<OpSlot>,
        notify: mpsc::Sender<ServiceState>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        fail_rx: mpsc::Receiver<HookError>,
        fail_tx: FailureSink,
        close: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            state,
            queue: TransitionQueue::default(),
            ops,
            notify,
            cmd_rx,
            fail_rx,
            fail_tx,
            close,
            restart: None,
        }
    }

    /// Runs until the entry is closed.
    ///
    /// Commands and failure reports are serialized here; each one triggers a
    /// full drain of the queue before the next is picked up.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.close.cancelled() => break,
                cmd = self.cmd_rx.recv() => {
                    let Some(Command { target, done }) = cmd else { break };
                    self.queue.push(target);
                    self.drain().await;
                    let _ = done.send(self.snapshot());
                }
                report = self.fail_rx.recv() => {
                    // fail_tx is also held here, so recv() cannot yield None.
                    let Some(err) = report else { break };
                    self.ops.swap(OpHandle::detached());
                    self.queue
                        .push(ServiceState::failed(ServiceError::hook(HookPhase::Runtime, err)));
                    self.drain().await;
                }
            }
        }
    }

    async fn drain(&mut self) {
        loop {
            let op = self.ops.current();
            if let Some(cause) = op.cancel_cause() {
                self.store(ServiceState::failed(cause));
                // Requests queued behind the cancelled op are abandoned for
                // this cycle; the next external call starts fresh.
                self.queue.clear();
                return;
            }

            let Some(next) = self.queue.pop() else { return };
            let applied = self.apply(&op, next).await;

            // A closing entry still applies everything already queued (a
            // backoff wait aborted by close queues the Closed failure, and it
            // must land as the final state); only notification is skipped.
            if self.close.is_cancelled() {
                continue;
            }
            tokio::select! {
                sent = self.notify.send(applied) => {
                    if sent.is_err() {
                        return;
                    }
                }
                _ = self.close.cancelled() => {}
            }
        }
    }

    /// Stores `next` as the current state, then runs the handler for the
    /// `(from, to)` pair if one exists. Handler failures are re-enqueued as an
    /// `Error` transition rather than propagated.
    async fn apply(&mut self, op: &OpHandle, next: ServiceState) -> ServiceState {
        let from = self.snapshot().status;
        self.store(next.clone());

        if let Some(result) = self.dispatch(op, from, next.status).await {
            if let Err(err) = result {
                self.queue.push(ServiceState::failed(err));
            }
        }
        next
    }

    /// The transition table. Unlisted pairs are silent no-ops.
    async fn dispatch(
        &mut self,
        op: &OpHandle,
        from: ServiceStatus,
        to: ServiceStatus,
    ) -> Option<Result<(), ServiceError>> {
        use ServiceStatus::*;
        match (from, to) {
            (Init, Starting) | (Stopped, Starting) | (Error, Starting) => {
                Some(self.run_startup(op).await)
            }
            (Starting, Stopping) | (Running, Stopping) => Some(self.run_shutdown(op).await),
            (Running, Error) => Some(self.evaluate_restart(op).await),
            _ => None,
        }
    }

    /// Startup handler: run the hook, enqueue `Running` on success.
    async fn run_startup(&mut self, op: &OpHandle) -> Result<(), ServiceError> {
        if let Some(hook) = self.cfg.startup_hook().cloned() {
            let fut = hook(op.token(), self.fail_tx.clone());
            tokio::select! {
                res = fut => {
                    res.map_err(|e| ServiceError::hook(HookPhase::Startup, e))?;
                }
                _ = op.cancelled() => {
                    return Err(op.cancel_cause().unwrap_or(ServiceError::Canceled));
                }
            }
        }
        self.queue.push(ServiceState::new(ServiceStatus::Running));
        Ok(())
    }

    /// Shutdown handler: run the hook, enqueue `Stopped` on success.
    async fn run_shutdown(&mut self, op: &OpHandle) -> Result<(), ServiceError> {
        if let Some(hook) = self.cfg.shutdown_hook().cloned() {
            let fut = hook(op.token());
            tokio::select! {
                res = fut => {
                    res.map_err(|e| ServiceError::hook(HookPhase::Shutdown, e))?;
                }
                _ = op.cancelled() => {
                    return Err(op.cancel_cause().unwrap_or(ServiceError::Canceled));
                }
            }
        }
        self.queue.push(ServiceState::new(ServiceStatus::Stopped));
        Ok(())
    }

    /// Restart evaluator for `Running → Error`.
    ///
    /// Returning the stored failure makes it terminal (the `Error → Error`
    /// re-application has no handler). Otherwise the minimum inter-attempt
    /// delay is enforced, accounting is bumped, a fresh op handle replaces the
    /// current one and `Starting` is enqueued as a retry.
    async fn evaluate_restart(&mut self, op: &OpHandle) -> Result<(), ServiceError> {
        let cause = self
            .snapshot()
            .error
            .unwrap_or(ServiceError::Canceled);

        let policy = self.cfg.restart();
        if !policy.on_failure {
            return Err(cause);
        }

        let restart = *self.restart.get_or_insert_with(RestartState::default);
        if policy.limit > 0 && restart.try_count >= policy.limit {
            return Err(cause);
        }

        if let Some(last) = restart.last_attempt {
            let elapsed = last.elapsed();
            if !policy.delay.is_zero() && elapsed < policy.delay {
                let wait = tokio::time::sleep(policy.delay - elapsed);
                tokio::pin!(wait);
                tokio::select! {
                    _ = &mut wait => {}
                    _ = op.cancelled() => {
                        return Err(op.cancel_cause().unwrap_or(ServiceError::Canceled));
                    }
                    _ = self.close.cancelled() => return Err(ServiceError::Closed),
                }
            }
        }

        if let Some(restart) = self.restart.as_mut() {
            restart.try_count += 1;
            restart.last_attempt = Some(Instant::now());
        }

        self.ops.swap(OpHandle::detached());
        self.queue.push(ServiceState::new(ServiceStatus::Starting));
        Ok(())
    }

    fn snapshot(&self) -> ServiceState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, state: ServiceState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
