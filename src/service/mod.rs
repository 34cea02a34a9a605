//! Per-service state machine: status model, configuration, transition queue,
//! and the entry that serializes transitions through a dedicated worker.
//!
//! Internal modules:
//! - [`status`]: [`ServiceStatus`] and [`ServiceState`];
//! - [`config`]: [`ServiceConfig`], [`RestartPolicy`], hook types;
//! - [`queue`]: FIFO of pending transitions;
//! - [`worker`]: the drain loop, transition handlers and restart evaluator;
//! - [`entry`]: the public [`ServiceEntry`] facade.

mod config;
mod entry;
mod queue;
mod status;
mod worker;

pub use config::{FailureSink, RestartPolicy, ServiceConfig};
pub use entry::ServiceEntry;
pub use status::{ServiceState, ServiceStatus};
