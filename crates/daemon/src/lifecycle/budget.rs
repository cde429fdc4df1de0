//! Restart budget and backoff: pure, deterministic state machines.
//!
//! All time values are passed in as epoch milliseconds; jitter is declared
//! here but applied by the runtime caller.

use std::time::Duration;

/// Sliding-window restart budget: at most `max_restarts` accepted restarts
/// within `window`.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    accepted: Vec<u64>,
    max_restarts: u32,
    window_ms: u64,
}

/// Outcome of asking the budget for a restart slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    /// A slot is free. Nothing is recorded until [`RestartBudget::commit`].
    Accepted,
    /// Budget exhausted; retry after this many seconds (time until the
    /// oldest accepted restart falls out of the window, rounded up).
    Denied { retry_after_seconds: u64 },
}

impl RestartBudget {
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            accepted: Vec::new(),
            max_restarts,
            window_ms: window.as_millis() as u64,
        }
    }

    /// Re-seed the window from persisted accept times (daemon restart).
    pub fn seed(&mut self, accepted_ms: impl IntoIterator<Item = u64>) {
        self.accepted.extend(accepted_ms);
        self.accepted.sort_unstable();
    }

    fn prune(&mut self, now_ms: u64) {
        let window_start = now_ms.saturating_sub(self.window_ms);
        self.accepted.retain(|&ts| ts > window_start);
    }

    /// Whether a slot is free at `now_ms`. Does not consume anything: the
    /// caller commits the slot only after the accepting audit is durable, so
    /// a failed audit never burns an attempt.
    pub fn evaluate(&mut self, now_ms: u64) -> BudgetCheck {
        self.prune(now_ms);
        if self.max_restarts > 0 && self.accepted.len() >= self.max_restarts as usize {
            let oldest = self.accepted.first().copied().unwrap_or(now_ms);
            let free_at = oldest.saturating_add(self.window_ms);
            let remaining_ms = free_at.saturating_sub(now_ms);
            return BudgetCheck::Denied {
                retry_after_seconds: remaining_ms.div_ceil(1_000).max(1),
            };
        }
        BudgetCheck::Accepted
    }

    /// Record an accepted restart at `now_ms`.
    pub fn commit(&mut self, now_ms: u64) {
        self.accepted.push(now_ms);
    }

    /// Accepted restarts currently inside the window.
    pub fn in_window(&mut self, now_ms: u64) -> usize {
        self.prune(now_ms);
        self.accepted.len()
    }
}

/// What caused a restart; each class backs off independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartClass {
    Crash,
    UserInitiated,
    PolicyInitiated,
}

impl RestartClass {
    fn index(self) -> usize {
        match self {
            Self::Crash => 0,
            Self::UserInitiated => 1,
            Self::PolicyInitiated => 2,
        }
    }
}

/// Exponential backoff per restart class. Returns pre-jitter delays; the
/// caller applies `jitter_pct` so shared-host agents don't stampede.
#[derive(Debug, Clone)]
pub struct BackoffTracker {
    initial: Duration,
    max: Duration,
    /// Consecutive failures per class.
    streaks: [u32; 3],
    pub jitter_pct: f64,
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            streaks: [0; 3],
            jitter_pct: 0.10,
        }
    }
}

impl BackoffTracker {
    /// Record a restart for `class` and return the pre-jitter delay to wait
    /// before respawning.
    pub fn next_delay(&mut self, class: RestartClass) -> Duration {
        let streak = &mut self.streaks[class.index()];
        let exp = (*streak).min(16);
        *streak = streak.saturating_add(1);
        let delay = self.initial.as_millis() as u64 * (1u64 << exp);
        Duration::from_millis(delay.min(self.max.as_millis() as u64))
    }

    /// A healthy run resets the streak for its class.
    pub fn reset(&mut self, class: RestartClass) {
        self.streaks[class.index()] = 0;
    }

    /// Apply jitter to a delay: `delay * (1 ± jitter_pct * unit)`.
    pub fn with_jitter(&self, delay: Duration, unit: f64) -> Duration {
        let factor = 1.0 + self.jitter_pct * unit.clamp(-1.0, 1.0);
        Duration::from_millis((delay.as_millis() as f64 * factor).max(0.0) as u64)
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
