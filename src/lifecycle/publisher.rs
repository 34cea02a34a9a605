//! # Broadcast publisher with last-value replay.
//!
//! [`Publisher`] fans one value out to a dynamic set of subscriber sinks and
//! remembers the last published value, so a late joiner immediately receives
//! exactly one replay on subscribe.
//!
//! ## Delivery policy
//! Delivery is `try_send` into each subscriber's bounded channel. A full
//! queue means the value is dropped **for that subscriber** (with a stderr
//! warning) rather than stalling every other subscriber behind it; the
//! last-value replay bounds how stale a lagging subscriber can get.
//!
//! Cancelling a [`Subscription`] is safe concurrently with an in-flight
//! publish: the live flag is checked per delivery, but a delivery already
//! performed at the moment of cancellation may still land (best effort).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

struct Slot<T> {
    id: u64,
    sink: mpsc::Sender<T>,
    live: Arc<AtomicBool>,
}

struct Inner<T> {
    subs: Vec<Slot<T>>,
    last: Option<T>,
    next_id: u64,
}

/// Fan-out of `T` to registered sinks, with one-value replay for late joiners.
pub struct Publisher<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Publisher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subs: Vec::new(),
                last: None,
                next_id: 0,
            })),
        }
    }

    /// Registers a sink. If a value was published before, it is delivered to
    /// the new sink immediately.
    pub fn subscribe(&self, sink: mpsc::Sender<T>) -> Subscription<T> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = &inner.last {
            if let Err(mpsc::error::TrySendError::Full(_)) = sink.try_send(last.clone()) {
                eprintln!("[servisor] monitor subscriber lagging, replay dropped");
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let live = Arc::new(AtomicBool::new(true));
        inner.subs.push(Slot {
            id,
            sink,
            live: Arc::clone(&live),
        });

        Subscription {
            id,
            live,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Delivers `value` to every live sink in registration order, then
    /// remembers it as the last value. Closed sinks are pruned.
    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subs.retain(|slot| !slot.sink.is_closed());
        for slot in &inner.subs {
            if !slot.live.load(Ordering::Acquire) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = slot.sink.try_send(value.clone()) {
                eprintln!("[servisor] monitor subscriber lagging, value dropped");
            }
        }
        inner.last = Some(value);
    }
}

/// Handle to an active subscription.
pub struct Subscription<T> {
    id: u64,
    live: Arc<AtomicBool>,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Subscription<T> {
    /// Unsubscribes. Values published after this call are not delivered.
    pub fn cancel(&self) {
        self.live.store(false, Ordering::Release);
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subs.retain(|slot| slot.id != self.id);
    }
}
