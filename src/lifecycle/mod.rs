//! Multi-service orchestration: the [`Lifecycle`] manager, aggregate state
//! monitoring and OS signal wiring.

mod core;
mod publisher;
mod signal;
mod state;

pub use self::core::Lifecycle;
pub use publisher::{Publisher, Subscription};
pub use signal::{wait_for_shutdown_signal, SignalHandler};
pub use state::NamedState;
