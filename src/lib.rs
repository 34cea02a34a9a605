//! # servisor
//!
//! **Servisor** is an in-process service lifecycle supervisor for Rust.
//!
//! It manages ordered startup and shutdown of long-lived application
//! components ("services"), each driven by a per-service state machine with
//! user-supplied startup/shutdown hooks, runtime failure reporting and
//! policy-driven restarts. The crate is designed as a building block for
//! daemons and servers that wire several subsystems together.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!     │ ServiceConfig │   │ ServiceConfig │   │ ServiceConfig │
//!     │ (user svc #1) │   │ (user svc #2) │   │ (user svc #3) │
//!     └──────┬────────┘   └──────┬────────┘   └──────┬────────┘
//!            ▼                   ▼                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Lifecycle (orchestrator)                                       │
//! │  - ordered registry of entries (start forward, stop reverse)    │
//! │  - StartStrategy (fail-fast / start-all / rollback)             │
//! │  - Publisher (aggregate Vec<NamedState>, last-value replay)     │
//! └──────┬───────────────────┬───────────────────┬──────────────────┘
//!        ▼                   ▼                   ▼
//!  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//!  │ ServiceEntry│     │ ServiceEntry│     │ ServiceEntry│
//!  │ worker task │     │ worker task │     │ worker task │
//!  │ (drain loop)│     │ (drain loop)│     │ (drain loop)│
//!  └──────┬──────┘     └──────┬──────┘     └──────┬──────┘
//!         │ notify            │ notify            │ notify
//!         ▼                   ▼                   ▼
//!    [monitor #0]        [monitor #1]        [monitor #2]
//!         └───────────────────┴───────────────────┘
//!                fold into Vec<NamedState>, publish
//! ```
//!
//! ### State machine
//! ```text
//!           start()                   stop()
//! Init ───► Starting ───► Running ───► Stopping ───► Stopped
//!  ▲            │            │                          │
//!  │       hook fails   runtime failure            start() again
//!  │            ▼            ▼                          │
//!  └─────────  Error ◄── restart evaluator ── retry ────┘
//!               │   (policy: on_failure, delay, limit)
//!               └─► terminal once the policy is exhausted
//! ```
//!
//! Each service entry is driven by a single worker task that owns a FIFO
//! transition queue. Transition handlers run under a cancellable, optionally
//! deadline-bounded operation handle ([`OpHandle`]); a timed-out or cancelled
//! operation abandons the rest of the queued transitions for that cycle.
//!
//! ## Features
//! | Area              | Description                                                   | Key types                                   |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Services**      | Define services via startup/shutdown hooks.                   | [`ServiceConfig`], [`ServiceEntry`]         |
//! | **Restarts**      | Policy-driven restart on runtime failures.                    | [`RestartPolicy`]                           |
//! | **Orchestration** | Ordered multi-service start/stop with strategies.             | [`Lifecycle`], [`StartStrategy`], [`Config`]|
//! | **Monitoring**    | Aggregate state snapshots and push subscriptions.             | [`NamedState`], [`Publisher`]               |
//! | **Signals**       | Stop the lifecycle on SIGINT/SIGTERM/SIGQUIT.                 | [`SignalHandler`]                           |
//! | **Errors**        | Typed errors preserving the causing hook failure.             | [`ServiceError`], [`Errors`]                |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use servisor::{Config, Lifecycle, RestartPolicy, ServiceConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lifecycle = Lifecycle::new(Config::default());
//!
//!     lifecycle.register_service(
//!         ServiceConfig::new("database")
//!             .on_start(|_ctx, _failures| async {
//!                 println!("database pool ready");
//!                 Ok(())
//!             })
//!             .on_stop(|_ctx| async {
//!                 println!("database pool drained");
//!                 Ok(())
//!             })
//!             .with_restart(RestartPolicy::never()),
//!     );
//!
//!     lifecycle.start().await?;
//!     // ... serve ...
//!     lifecycle.stop().await?;
//!     lifecycle.close().await;
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod lifecycle;
mod op;
mod service;

// ---- Public re-exports ----

pub use config::{Config, StartStrategy};
pub use error::{Errors, HookError, HookPhase, ServiceError};
pub use lifecycle::{
    wait_for_shutdown_signal, Lifecycle, NamedState, Publisher, SignalHandler, Subscription,
};
pub use op::OpHandle;
pub use service::{
    FailureSink, RestartPolicy, ServiceConfig, ServiceEntry, ServiceState, ServiceStatus,
};

// Optional: expose a simple built-in state logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
