//! Serializable selection of a wait strategy.
//!
//! ```
//! use eddy::config::WaitStrategyConfig;
//!
//! let config: WaitStrategyConfig = serde_json::from_str(
//!     r#"{ "kind": "phased_backoff", "spin_timeout": 1, "yield_timeout": 1, "unit": "milliseconds" }"#,
//! ).unwrap();
//! let strategy = config.build();
//! # let _ = strategy;
//! ```

use crate::wait::{
    BlockingWaitStrategy, BusySpinWaitStrategy, LiteBlockingWaitStrategy, PhasedBackoffWaitStrategy,
    SleepingWaitStrategy, WaitStrategy, YieldingWaitStrategy, DEFAULT_RETRIES, DEFAULT_SLEEP,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Unit of the phased backoff timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    pub fn duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
        }
    }
}

/// Which [`WaitStrategy`] to build, and with what parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaitStrategyConfig {
    BusySpin,
    Yielding,
    Sleeping {
        #[serde(default = "default_retries")]
        retries: u32,
        /// Sleep per idle iteration once spinning and yielding are exhausted.
        #[serde(default = "default_sleep_nanos")]
        sleep_nanos: u64,
    },
    #[default]
    Blocking,
    LiteBlocking,
    PhasedBackoff {
        spin_timeout: u64,
        yield_timeout: u64,
        #[serde(default)]
        unit: TimeUnit,
        /// Strategy the wait is handed to after both timeouts; blocking if absent.
        #[serde(default)]
        fallback: Box<WaitStrategyConfig>,
    },
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_sleep_nanos() -> u64 {
    DEFAULT_SLEEP.as_nanos() as u64
}

impl WaitStrategyConfig {
    pub fn build(&self) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyConfig::BusySpin => Arc::new(BusySpinWaitStrategy),
            WaitStrategyConfig::Yielding => Arc::new(YieldingWaitStrategy),
            WaitStrategyConfig::Sleeping { retries, sleep_nanos } => Arc::new(
                SleepingWaitStrategy::with_sleep(*retries, Duration::from_nanos(*sleep_nanos)),
            ),
            WaitStrategyConfig::Blocking => Arc::new(BlockingWaitStrategy::new()),
            WaitStrategyConfig::LiteBlocking => Arc::new(LiteBlockingWaitStrategy::new()),
            WaitStrategyConfig::PhasedBackoff {
                spin_timeout,
                yield_timeout,
                unit,
                fallback,
            } => Arc::new(PhasedBackoffWaitStrategy::new(
                unit.duration(*spin_timeout),
                unit.duration(*yield_timeout),
                fallback.build(),
            )),
        }
    }
}
