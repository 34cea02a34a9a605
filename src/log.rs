//! # Simple logging monitor for debugging and demos.
//!
//! [`LogWriter`] subscribes to a lifecycle's aggregate state updates and
//! prints every changed entry to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [state] 0 database: running
//! [state] 1 api: error (startup hook failed: connection refused)
//! ```
//!
//! Enabled via the `logging` feature. Not intended for production use;
//! subscribe to the monitor directly for structured logging or metrics.

use tokio::sync::mpsc;

use crate::lifecycle::{Lifecycle, NamedState, Subscription};

/// Stdout logging monitor.
pub struct LogWriter {
    subscription: Subscription<Vec<NamedState>>,
}

impl LogWriter {
    /// Subscribes to `lifecycle` and spawns a task printing each aggregate
    /// update. Dropping the returned writer does not stop it; call
    /// [`detach`](Self::detach) for that.
    pub fn attach(lifecycle: &Lifecycle) -> Self {
        let (tx, mut rx) = mpsc::channel::<Vec<NamedState>>(16);
        let subscription = lifecycle.subscribe_monitor(tx);
        tokio::spawn(async move {
            let mut previous: Vec<String> = Vec::new();
            while let Some(aggregate) = rx.recv().await {
                for (i, state) in aggregate.iter().enumerate() {
                    let line = state.to_string();
                    if previous.get(i) != Some(&line) {
                        println!("[state] {line}");
                    }
                }
                previous = aggregate.iter().map(|s| s.to_string()).collect();
            }
        });
        Self { subscription }
    }

    /// Stops printing. The spawned task exits once its queue runs dry.
    pub fn detach(self) {
        self.subscription.cancel();
    }
}
