//! Per-fetch latency budget.

use std::time::Duration;

/// Budget used when a caller passes `0`.
pub const DEFAULT_LATENCY_BUDGET: Duration = Duration::from_secs(30);

/// Time limit applied separately to sending a request and reading its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyBudget {
    /// [`DEFAULT_LATENCY_BUDGET`].
    #[default]
    Default,
    Bounded(Duration),
    Unbounded,
}

impl LatencyBudget {
    /// Interprets a millisecond count: positive is a bound, zero the
    /// default, negative unbounded.
    pub fn from_millis(millis: i64) -> Self {
        match millis {
            0 => LatencyBudget::Default,
            m if m > 0 => LatencyBudget::Bounded(Duration::from_millis(m as u64)),
            _ => LatencyBudget::Unbounded,
        }
    }

    /// Effective limit, `None` when unbounded.
    pub fn limit(self) -> Option<Duration> {
        match self {
            LatencyBudget::Default => Some(DEFAULT_LATENCY_BUDGET),
            LatencyBudget::Bounded(limit) => Some(limit),
            LatencyBudget::Unbounded => None,
        }
    }
}
