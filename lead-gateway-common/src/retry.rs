//! # Retry
//!
//! A fixed backoff schedule: `base * 2^i` for `i = 0..max_attempts-1`. Unlike
//! a coefficient-driven policy that derives an interval on demand, the
//! schedule here is precomputed once so the processor can look up "the delay
//! before attempt n" without recomputing the power each time.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct BackoffSchedule {
    base: Duration,
    max_attempts: u32,
}

impl BackoffSchedule {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay to wait before issuing attempt `attempt_no` (1-based). There
    /// is no delay before the first attempt.
    pub fn delay_before(&self, attempt_no: u32) -> Duration {
        if attempt_no <= 1 {
            return Duration::ZERO;
        }

        let i = attempt_no - 2;
        self.base.saturating_mul(1u32.checked_shl(i).unwrap_or(u32::MAX))
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 5)
    }
}
