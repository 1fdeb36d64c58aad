use std::time::Duration;

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(8);
pub const DEFAULT_MULTIPLIER: u32 = 2;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Longest total sleep a policy may schedule. Lambda stops an invocation
/// at 900s; the remainder covers engine round trips and the response.
pub const MAX_WAIT_BUDGET: Duration = Duration::from_secs(780);

/// Bounded exponential backoff for waiting on an asynchronous job.
///
/// `max_attempts` counts status checks. The first check happens
/// immediately; `delay_after(n)` is the pause following the `n`-th
/// (zero-based) non-terminal check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollPolicyError {
    #[error("max_attempts must be a positive integer")]
    ZeroAttempts,
    #[error("multiplier must be a positive integer")]
    ZeroMultiplier,
    #[error("initial interval {initial:?} exceeds max interval {max:?}")]
    InitialExceedsMax { initial: Duration, max: Duration },
    #[error("worst-case wait {worst_case:?} exceeds the {budget:?} budget")]
    ExceedsWaitBudget { worst_case: Duration, budget: Duration },
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    /// Constant interval between checks.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1,
            max_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), PollPolicyError> {
        if self.max_attempts == 0 {
            return Err(PollPolicyError::ZeroAttempts);
        }
        if self.multiplier == 0 {
            return Err(PollPolicyError::ZeroMultiplier);
        }
        if self.initial_interval > self.max_interval {
            return Err(PollPolicyError::InitialExceedsMax {
                initial: self.initial_interval,
                max: self.max_interval,
            });
        }
        let worst_case = self.worst_case_wait();
        if worst_case > MAX_WAIT_BUDGET {
            return Err(PollPolicyError::ExceedsWaitBudget {
                worst_case,
                budget: MAX_WAIT_BUDGET,
            });
        }
        Ok(())
    }

    pub fn delay_after(&self, check_index: u32) -> Duration {
        self.multiplier
            .checked_pow(check_index)
            .and_then(|factor| self.initial_interval.checked_mul(factor))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }

    /// Every pause the policy can take, in order. One fewer than
    /// `max_attempts` since no pause follows the final check.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|index| self.delay_after(index))
    }

    /// Upper bound on time spent sleeping before giving up.
    pub fn worst_case_wait(&self) -> Duration {
        let pauses = self.max_attempts.saturating_sub(1);
        let mut total = Duration::ZERO;
        let mut previous = None;
        for index in 0..pauses {
            let delay = self.delay_after(index);
            // once the delay stops changing the rest of the schedule is flat
            if delay == self.max_interval || previous == Some(delay) {
                return total.saturating_add(delay.saturating_mul(pauses - index));
            }
            total = total.saturating_add(delay);
            previous = Some(delay);
        }
        total
    }
}
