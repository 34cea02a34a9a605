//! # Operation handles: cancellable, deadline-capable transition contexts.
//!
//! Every `start`/`stop` request and every restart attempt runs under an
//! [`OpHandle`]. The handle wraps a [`CancellationToken`] and remembers its
//! deadline, so that after cancellation the entry can tell a timeout apart
//! from an explicit cancel when recording the failure cause.
//!
//! [`OpSlot`] is the per-entry "current operation" slot: installing a new
//! handle cancels the previous one, guaranteeing at most one live cancellable
//! hook invocation per entry and that a superseded hook cannot keep running
//! unnoticed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Cancellable context governing one hook invocation or transition request.
///
/// Cheap to clone; clones share the same token and deadline.
#[derive(Clone, Debug)]
pub struct OpHandle {
    token: CancellationToken,
    timed_out: Arc<AtomicBool>,
    timeout: Option<Duration>,
}

impl OpHandle {
    /// Creates a handle with no deadline. Cancellation only via [`cancel`](Self::cancel).
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            timed_out: Arc::new(AtomicBool::new(false)),
            timeout: None,
        }
    }

    /// Creates a handle whose token is cancelled once `timeout` elapses.
    ///
    /// Spawns a watchdog task; the watchdog exits early if the token is
    /// cancelled first. Must be called within a tokio runtime.
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + timeout;
        let watch = token.clone();
        let expired = Arc::clone(&timed_out);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    // Cause is recorded before the cancel so observers of the
                    // cancelled token always see it.
                    expired.store(true, Ordering::Release);
                    watch.cancel();
                }
                _ = watch.cancelled() => {}
            }
        });
        Self {
            token,
            timed_out,
            timeout: Some(timeout),
        }
    }

    /// Derives a child handle sharing this handle's deadline.
    ///
    /// Cancelling the child does not cancel the parent; cancelling the parent
    /// cancels the child.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            timed_out: Arc::clone(&self.timed_out),
            timeout: self.timeout,
        }
    }

    /// The cancellation token driving user hooks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancels the handle.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the handle is cancelled or its deadline fires.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Why the handle is cancelled, or `None` if it is still live.
    ///
    /// The cause is fixed at cancellation time: a handle cancelled by its
    /// watchdog reports [`ServiceError::Timeout`], an explicitly cancelled one
    /// reports [`ServiceError::Canceled`] even if queried after the deadline
    /// has since passed.
    pub(crate) fn cancel_cause(&self) -> Option<ServiceError> {
        if !self.token.is_cancelled() {
            return None;
        }
        match (self.timed_out.load(Ordering::Acquire), self.timeout) {
            (true, Some(timeout)) => Some(ServiceError::Timeout { timeout }),
            _ => Some(ServiceError::Canceled),
        }
    }
}

impl Default for OpHandle {
    fn default() -> Self {
        Self::detached()
    }
}

/// The entry's current-operation slot.
///
/// [`swap`](Self::swap) cancels whatever handle was installed before. Shared
/// between the entry facade (external `start`/`stop`) and its worker
/// (restart-issued handles, failure reports).
#[derive(Debug, Default)]
pub(crate) struct OpSlot {
    current: Mutex<OpHandle>,
}

impl OpSlot {
    /// Installs `next`, cancelling the previously installed handle.
    pub fn swap(&self, next: OpHandle) {
        let mut cur = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        cur.cancel();
        *cur = next;
    }

    /// Snapshot of the currently installed handle.
    pub fn current(&self) -> OpHandle {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_is_live_until_cancelled() {
        let op = OpHandle::detached();
        assert!(!op.is_cancelled());
        assert!(op.cancel_cause().is_none());

        op.cancel();
        assert!(matches!(op.cancel_cause(), Some(ServiceError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_timeout_cause() {
        let op = OpHandle::with_timeout(Duration::from_millis(50));
        op.cancelled().await;
        assert!(matches!(
            op.cancel_cause(),
            Some(ServiceError::Timeout { timeout }) if timeout == Duration::from_millis(50)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_before_deadline_is_canceled() {
        let op = OpHandle::with_timeout(Duration::from_secs(60));
        op.cancel();
        assert!(matches!(op.cancel_cause(), Some(ServiceError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn cause_is_fixed_at_cancellation_time() {
        let op = OpHandle::with_timeout(Duration::from_millis(10));
        op.cancel();
        // Querying after the deadline has passed must not rewrite the cause.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(op.cancel_cause(), Some(ServiceError::Canceled)));
    }

    #[tokio::test]
    async fn child_cancel_does_not_touch_parent() {
        let op = OpHandle::detached();
        let child = op.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!op.is_cancelled());
    }

    #[tokio::test]
    async fn slot_swap_cancels_previous() {
        let slot = OpSlot::default();
        let first = slot.current();
        assert!(!first.is_cancelled());

        slot.swap(OpHandle::detached());
        assert!(first.is_cancelled());
        assert!(!slot.current().is_cancelled());
    }
}
