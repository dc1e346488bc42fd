//! Serde-loadable router configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{RetryConfig, RetryPolicy};

/// How scatter-gather dispatches its routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every route on its own task.
    #[default]
    Parallel,
    /// One route after another, in declaration order.
    Sequential,
}

/// Which built-in aggregation strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    CollectMap,
    CollectList,
    FirstSuccessful,
}

/// Configuration for scatter-gather.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterGatherConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Parallel mode: deadline for the whole fan-out. Sequential mode:
    /// deadline for each route. `None` waits forever.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Maximum number of routes running at once in parallel mode.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Hand failures to the strategy instead of failing the fan-out.
    #[serde(default)]
    pub tolerate_failures: bool,
    /// Stop collecting at the first failed route.
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl ScatterGatherConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ScatterGatherConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            timeout_ms: None,
            max_concurrency: default_max_concurrency(),
            tolerate_failures: false,
            fail_fast: false,
            strategy: StrategyKind::default(),
        }
    }
}

/// Configuration for until-successful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UntilSuccessfulConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_millis_between_retries")]
    pub millis_between_retries: u64,
    /// `1.0` keeps the delay fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on a single delay. Unset means the fixed delay when the
    /// multiplier is `1.0`, otherwise [`DEFAULT_MAX_BACKOFF_MS`].
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

/// Delay ceiling for a growing backoff with no explicit cap: one hour.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 3_600_000;

impl UntilSuccessfulConfig {
    pub fn policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.millis_between_retries);
        let max_backoff = match self.max_backoff_ms {
            Some(ms) => Duration::from_millis(ms),
            None if self.backoff_multiplier > 1.0 => {
                Duration::from_millis(DEFAULT_MAX_BACKOFF_MS).max(initial)
            }
            None => initial,
        };
        RetryPolicy::new(RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: initial,
            max_backoff,
            multiplier: self.backoff_multiplier,
        })
    }
}

impl Default for UntilSuccessfulConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            millis_between_retries: default_millis_between_retries(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: None,
        }
    }
}

/// A router, as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterConfig {
    ScatterGather(ScatterGatherConfig),
    FirstSuccessful,
    RoundRobin,
    UntilSuccessful(UntilSuccessfulConfig),
}

fn default_max_concurrency() -> usize {
    16
}

fn default_max_retries() -> u32 {
    5
}

fn default_millis_between_retries() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}
