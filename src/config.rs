//! # Global lifecycle configuration.
//!
//! [`Config`] holds the settings shared by every orchestrated start/stop
//! pass; [`StartStrategy`] is the bit-flag policy controlling how the start
//! pass reacts to failures.
//!
//! ## Sentinel values
//! - `startup_timeout = 0` / `shutdown_timeout = 0` → replaced by the 5s default
//! - empty `StartStrategy` → replaced by `FAIL_FAST | ROLLBACK_ON_ERROR`

use std::ops::BitOr;
use std::time::Duration;

/// Bit flags controlling start-pass failure behavior.
///
/// Flags combine with `|`:
///
/// ```
/// use servisor::StartStrategy;
///
/// let strategy = StartStrategy::START_ALL | StartStrategy::ROLLBACK_ON_ERROR;
/// assert!(strategy.contains(StartStrategy::ROLLBACK_ON_ERROR));
/// assert!(!strategy.contains(StartStrategy::FAIL_FAST));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartStrategy(u8);

impl StartStrategy {
    /// Stop the start pass at the first failing service (default).
    pub const FAIL_FAST: StartStrategy = StartStrategy(1 << 0);
    /// Attempt every service regardless of earlier failures.
    pub const START_ALL: StartStrategy = StartStrategy(1 << 1);
    /// On any failure, stop already-started services in reverse order.
    pub const ROLLBACK_ON_ERROR: StartStrategy = StartStrategy(1 << 2);

    /// No flags set.
    pub const fn empty() -> Self {
        StartStrategy(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `flag` is set in `self`.
    pub const fn contains(self, flag: StartStrategy) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for StartStrategy {
    type Output = StartStrategy;

    fn bitor(self, rhs: StartStrategy) -> StartStrategy {
        StartStrategy(self.0 | rhs.0)
    }
}

impl Default for StartStrategy {
    /// Returns `FAIL_FAST | ROLLBACK_ON_ERROR`.
    fn default() -> Self {
        StartStrategy::FAIL_FAST | StartStrategy::ROLLBACK_ON_ERROR
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline for one whole orchestrated start pass.
    pub startup_timeout: Duration,
    /// Deadline for one whole stop (or rollback) pass.
    pub shutdown_timeout: Duration,
    /// Failure behavior of the start pass.
    pub start_strategy: StartStrategy,
}

impl Config {
    /// Replaces sentinel (zero/empty) fields with defaults.
    pub(crate) fn normalized(mut self) -> Self {
        let defaults = Config::default();
        if self.startup_timeout.is_zero() {
            self.startup_timeout = defaults.startup_timeout;
        }
        if self.shutdown_timeout.is_zero() {
            self.shutdown_timeout = defaults.shutdown_timeout;
        }
        if self.start_strategy.is_empty() {
            self.start_strategy = defaults.start_strategy;
        }
        self
    }
}

impl Default for Config {
    /// 5s startup timeout, 5s shutdown timeout, `FAIL_FAST | ROLLBACK_ON_ERROR`.
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            start_strategy: StartStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_is_fail_fast_with_rollback() {
        let s = StartStrategy::default();
        assert!(s.contains(StartStrategy::FAIL_FAST));
        assert!(s.contains(StartStrategy::ROLLBACK_ON_ERROR));
        assert!(!s.contains(StartStrategy::START_ALL));
    }

    #[test]
    fn contains_requires_all_bits() {
        let s = StartStrategy::FAIL_FAST;
        assert!(!s.contains(StartStrategy::FAIL_FAST | StartStrategy::START_ALL));
    }

    #[test]
    fn normalized_fills_sentinels() {
        let cfg = Config {
            startup_timeout: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(1),
            start_strategy: StartStrategy::empty(),
        }
        .normalized();

        assert_eq!(cfg.startup_timeout, Duration::from_secs(5));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(cfg.start_strategy, StartStrategy::default());
    }
}
