//! # Service entry: the public facade over one supervised service.
//!
//! [`ServiceEntry`] owns the worker task, the shared state cell and the
//! current-operation slot. External callers interact with it through
//! `start`/`stop` (blocking until the requested transition and everything it
//! synchronously triggers has been applied), `state` (snapshot read) and
//! `close`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::op::{OpHandle, OpSlot};

use super::config::ServiceConfig;
use super::status::{ServiceState, ServiceStatus};
use super::worker::{Command, Worker};

/// One supervised service: state cell, op slot, and a handle to the worker.
///
/// Created by [`spawn`](Self::spawn); destroyed by [`close`](Self::close).
pub struct ServiceEntry {
    state: Arc<RwLock<ServiceState>>,
    ops: Arc<OpSlot>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    close: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceEntry {
    /// Creates the entry and spawns its worker task.
    ///
    /// Applied states are delivered to `notify` in application order; the
    /// send is blocking, so a slow consumer throttles the worker. Must be
    /// called within a tokio runtime.
    pub fn spawn(cfg: ServiceConfig, notify: mpsc::Sender<ServiceState>) -> Self {
        let state = Arc::new(RwLock::new(ServiceState::default()));
        let ops = Arc::new(OpSlot::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (fail_tx, fail_rx) = mpsc::channel(1);
        let close = CancellationToken::new();

        let worker = Worker::new(
            cfg,
            Arc::clone(&state),
            Arc::clone(&ops),
            notify,
            cmd_rx,
            fail_rx,
            fail_tx,
            close.clone(),
        );
        let handle = tokio::spawn(worker.run());

        Self {
            state,
            ops,
            cmd_tx,
            close,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Requests `Starting` and waits for the resulting drain to finish.
    ///
    /// Returns the stored error iff the final observed status is `Error`.
    pub async fn start(&self, op: OpHandle) -> Result<(), ServiceError> {
        self.request(ServiceStatus::Starting, op).await
    }

    /// Requests `Stopping`; same contract as [`start`](Self::start).
    pub async fn stop(&self, op: OpHandle) -> Result<(), ServiceError> {
        self.request(ServiceStatus::Stopping, op).await
    }

    /// Snapshot of the last fully applied state.
    pub fn state(&self) -> ServiceState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stops the worker and waits for in-flight work on this entry to finish.
    /// Pending queued transitions are abandoned.
    pub async fn close(&self) {
        self.close.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn request(&self, status: ServiceStatus, op: OpHandle) -> Result<(), ServiceError> {
        // Installing the caller's handle cancels whichever hook invocation the
        // previous handle was driving.
        self.ops.swap(op);

        let (done_tx, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command {
                target: ServiceState::new(status),
                done: done_tx,
            })
            .map_err(|_| ServiceError::Closed)?;

        let state = done_rx.await.map_err(|_| ServiceError::Closed)?;
        if state.is_error() {
            Err(state.error.unwrap_or(ServiceError::Canceled))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::service::config::{FailureSink, RestartPolicy};
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use std::time::Duration;
    use thiserror::Error;
    use tokio::time::Instant;

    #[derive(Debug, Error, PartialEq)]
    #[error("injected failure")]
    struct InjectedError;

    type Seen = Arc<Mutex<Vec<(Instant, ServiceState)>>>;

    /// Spawns an entry plus a drainer that records every applied state with
    /// its (virtual) timestamp.
    fn harness(cfg: ServiceConfig) -> (ServiceEntry, Seen) {
        let (tx, mut rx) = mpsc::channel(1);
        let entry = ServiceEntry::spawn(cfg, tx);
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Some(state) = rx.recv().await {
                sink.lock().unwrap().push((Instant::now(), state));
            }
        });
        (entry, seen)
    }

    fn statuses(seen: &Seen) -> Vec<ServiceStatus> {
        seen.lock().unwrap().iter().map(|(_, s)| s.status).collect()
    }

    /// Startup hook that reports `count` runtime failures through the sink,
    /// `wait` after each (re)start.
    fn crashing_startup(
        count: i32,
        wait: Duration,
    ) -> impl Fn(CancellationToken, FailureSink) -> futures::future::BoxFuture<'static, Result<(), HookError>>
           + Send
           + Sync
           + 'static {
        let remaining = Arc::new(AtomicI32::new(count));
        move |_token, failures| {
            let remaining = Arc::clone(&remaining);
            let fut: futures::future::BoxFuture<'static, Result<(), HookError>> =
                Box::pin(async move {
                    if remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                        tokio::spawn(async move {
                            tokio::time::sleep(wait).await;
                            let _ = failures.send(Box::new(InjectedError) as HookError).await;
                        });
                    }
                    Ok(())
                });
            fut
        }
    }

    #[tokio::test]
    async fn successful_startup_reaches_running() {
        let cfg = ServiceConfig::new("ok").on_start(|_token, _failures| async { Ok(()) });
        let (entry, seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Running);
        assert!(state.error.is_none());

        // Init -> Starting -> Running, observed in order.
        assert_eq!(
            statuses(&seen),
            vec![ServiceStatus::Starting, ServiceStatus::Running]
        );
        entry.close().await;
    }

    #[tokio::test]
    async fn startup_error_is_terminal_and_preserved() {
        let cfg = ServiceConfig::new("boom")
            .on_start(|_token, _failures| async { Err(Box::new(InjectedError) as HookError) });
        let (entry, _seen) = harness(cfg);

        let err = entry.start(OpHandle::detached()).await.expect_err("start");
        assert!(err
            .hook_source()
            .and_then(|s| s.downcast_ref::<InjectedError>())
            .is_some());

        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Error);
        assert!(state
            .error
            .as_ref()
            .and_then(|e| e.hook_source())
            .and_then(|s| s.downcast_ref::<InjectedError>())
            .is_some());
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn startup_deadline_yields_timeout_even_if_hook_never_returns() {
        let cfg = ServiceConfig::new("slow").on_start(|_token, _failures| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let (entry, _seen) = harness(cfg);

        let err = entry
            .start(OpHandle::with_timeout(Duration::from_millis(10)))
            .await
            .expect_err("start");
        assert!(matches!(err, ServiceError::Timeout { .. }));

        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Error);
        assert!(matches!(state.error, Some(ServiceError::Timeout { .. })));
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_error_without_restart_is_terminal() {
        let cfg = ServiceConfig::new("crash")
            .on_start(crashing_startup(1, Duration::from_millis(5)))
            .with_restart(RestartPolicy::never());
        let (entry, _seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        assert_eq!(entry.state().status, ServiceStatus::Running);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Error);
        assert!(state
            .error
            .as_ref()
            .and_then(|e| e.hook_source())
            .and_then(|s| s.downcast_ref::<InjectedError>())
            .is_some());
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn runtime_error_recovers_with_one_restart() {
        let cfg = ServiceConfig::new("flappy")
            .on_start(crashing_startup(1, Duration::from_millis(5)))
            .with_restart(RestartPolicy {
                on_failure: true,
                delay: Duration::ZERO,
                limit: 0,
            });
        let (entry, seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Running);
        assert!(state.error.is_none());

        // Exactly one restart attempt: two Starting transitions overall.
        let starts = statuses(&seen)
            .iter()
            .filter(|s| **s == ServiceStatus::Starting)
            .count();
        assert_eq!(starts, 2);
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_limit_exhaustion_surfaces_original_cause() {
        let cfg = ServiceConfig::new("hopeless")
            .on_start(crashing_startup(10, Duration::from_millis(4)))
            .with_restart(RestartPolicy {
                on_failure: true,
                delay: Duration::ZERO,
                limit: 3,
            });
        let (entry, seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Error);
        // Not a distinct "exhausted" value: the original hook failure.
        assert!(state
            .error
            .as_ref()
            .and_then(|e| e.hook_source())
            .and_then(|s| s.downcast_ref::<InjectedError>())
            .is_some());

        // Initial start + 3 permitted retries.
        let starts = statuses(&seen)
            .iter()
            .filter(|s| **s == ServiceStatus::Starting)
            .count();
        assert_eq!(starts, 4);
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_delay_spaces_attempts() {
        let delay = Duration::from_millis(50);
        let cfg = ServiceConfig::new("throttled")
            .on_start(crashing_startup(3, Duration::from_millis(1)))
            .with_restart(RestartPolicy {
                on_failure: true,
                delay,
                limit: 0,
            });
        let (entry, seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        tokio::time::sleep(Duration::from_secs(2)).await;

        let starting: Vec<Instant> = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| s.status == ServiceStatus::Starting)
            .map(|(at, _)| *at)
            .collect();
        assert!(starting.len() >= 3, "expected restarts, saw {starting:?}");
        // Skip the initial start; successive restart attempts are >= delay apart.
        for pair in starting[1..].windows(2) {
            assert!(
                pair[1] - pair[0] >= delay,
                "attempts too close: {:?}",
                pair[1] - pair[0]
            );
        }
        entry.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_restart_wait_reports_closed() {
        let cfg = ServiceConfig::new("stuck")
            .on_start(crashing_startup(2, Duration::from_millis(5)))
            .with_restart(RestartPolicy {
                on_failure: true,
                delay: Duration::from_secs(3600),
                limit: 0,
            });
        let (entry, _seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        // First crash restarts immediately; the second parks in the backoff
        // wait, which close() must abort.
        tokio::time::sleep(Duration::from_millis(50)).await;
        entry.close().await;

        let state = entry.state();
        assert_eq!(state.status, ServiceStatus::Error);
        assert!(matches!(state.error, Some(ServiceError::Closed)));
    }

    #[tokio::test]
    async fn stop_runs_shutdown_hook() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let cfg = ServiceConfig::new("svc")
            .on_start(|_token, _failures| async { Ok(()) })
            .on_stop(move |_token| {
                let flag = Arc::clone(&flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            });
        let (entry, seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        entry.stop(OpHandle::detached()).await.expect("stop");

        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(entry.state().status, ServiceStatus::Stopped);
        assert_eq!(
            statuses(&seen),
            vec![
                ServiceStatus::Starting,
                ServiceStatus::Running,
                ServiceStatus::Stopping,
                ServiceStatus::Stopped,
            ]
        );
        entry.close().await;
    }

    #[tokio::test]
    async fn shutdown_hook_failure_is_reported() {
        let cfg = ServiceConfig::new("svc")
            .on_start(|_token, _failures| async { Ok(()) })
            .on_stop(|_token| async { Err(Box::new(InjectedError) as HookError) });
        let (entry, _seen) = harness(cfg);

        entry.start(OpHandle::detached()).await.expect("start");
        let err = entry.stop(OpHandle::detached()).await.expect_err("stop");
        assert!(err
            .hook_source()
            .and_then(|s| s.downcast_ref::<InjectedError>())
            .is_some());
        assert_eq!(entry.state().status, ServiceStatus::Error);
        entry.close().await;
    }

    #[tokio::test]
    async fn unhandled_pair_is_silent_noop() {
        let cfg = ServiceConfig::new("bare");
        let (entry, _seen) = harness(cfg);

        // Init -> Stopping is not in the table: applied, no handler, no error.
        entry.stop(OpHandle::detached()).await.expect("stop");
        assert_eq!(entry.state().status, ServiceStatus::Stopping);
        entry.close().await;
    }

    #[tokio::test]
    async fn state_reads_are_idempotent() {
        let cfg = ServiceConfig::new("svc").on_start(|_token, _failures| async { Ok(()) });
        let (entry, _seen) = harness(cfg);
        entry.start(OpHandle::detached()).await.expect("start");

        let a = entry.state();
        let b = entry.state();
        assert_eq!(a.status, b.status);
        assert!(a.error.is_none() && b.error.is_none());
        entry.close().await;
    }

    #[tokio::test]
    async fn requests_after_close_fail_with_closed() {
        let cfg = ServiceConfig::new("svc").on_start(|_token, _failures| async { Ok(()) });
        let (entry, _seen) = harness(cfg);

        entry.close().await;
        let err = entry.start(OpHandle::detached()).await.expect_err("start");
        assert!(matches!(err, ServiceError::Closed));
    }
}
