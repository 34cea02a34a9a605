//! FIFO of pending transition requests for one service.
//!
//! Every requested transition is queued and dequeued in order, including ones
//! the state machine will apply as silent no-ops. Push and pop take the same
//! exclusive lock; FIFO integrity holds under concurrent producers.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::status::ServiceState;

#[derive(Debug, Default)]
pub(crate) struct TransitionQueue {
    items: Mutex<VecDeque<ServiceState>>,
}

impl TransitionQueue {
    /// Appends a requested state.
    pub fn push(&self, state: ServiceState) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(state);
    }

    /// Removes and returns the oldest request, if any.
    pub fn pop(&self) -> Option<ServiceState> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops all pending requests (abandon-on-cancel).
    pub fn clear(&self) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
