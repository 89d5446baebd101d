//! Backoff policy for the reconnect loop.

use std::time::Duration;

use tracing::warn;

/// Maps a consecutive-failure count to a reconnect delay.
///
/// The delay is deterministic and monotonically non-decreasing in the
/// attempt number, capped so a long outage never produces an absurd wait.
/// Determinism matters more here than jitter: one recorder per feed is the
/// normal deployment, so there is no herd to spread out, and a predictable
/// schedule is far easier to assert on in tests and to read in logs.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial: Duration,
    multiplier: f64,
    cap: Duration,
}

impl Default for BackoffPolicy {
    /// 1s doubling to a 30s cap.
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl BackoffPolicy {
    /// Exponential backoff: `initial`, doubling per attempt, capped.
    pub fn exponential(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            cap,
        }
    }

    /// Constant delay for every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            multiplier: 1.0,
            cap: delay,
        }
    }

    /// Overrides the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Clamps out-of-range values so the policy is safe to run with:
    /// a multiplier below 1 (delays must not shrink) and a cap below the
    /// initial delay are both raised.
    pub fn validated(mut self) -> Self {
        if self.multiplier < 1.0 || !self.multiplier.is_finite() {
            warn!(multiplier = self.multiplier, "backoff multiplier below 1 — clamping");
            self.multiplier = 1.0;
        }
        if self.cap < self.initial {
            warn!(
                cap = ?self.cap,
                initial = ?self.initial,
                "backoff cap below initial delay — raising cap"
            );
            self.cap = self.initial;
        }
        self
    }

    /// Delay before retry number `attempt` (1-based; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        // Beyond 2^63 the cap has long since taken over.
        let factor = self.multiplier.powi(exponent.min(63) as i32);
        let secs = (self.initial.as_secs_f64() * factor).min(self.cap.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

// =========================================================================
// Tests
// =========================================================================
