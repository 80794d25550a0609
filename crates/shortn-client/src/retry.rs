use rand::Rng;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// How callers keep trying to (re)connect to the backend.
///
/// Delays grow exponentially from `base_delay`, are capped at `max_delay`,
/// and get up to 25% random jitter so reconnecting callers spread out.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    /// Failed attempts allowed before giving up. `None` retries forever.
    #[builder(default = Some(10))]
    pub max_attempts: Option<u32>,
    #[builder(default = Duration::from_millis(50))]
    pub base_delay: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub max_delay: Duration,
    #[builder(default = true)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// A policy that never gives up.
    pub fn unbounded() -> Self {
        Self::builder().max_attempts(None).build()
    }

    /// Returns `true` once `failures` failed attempts use up the budget.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);

        if !self.jitter || capped.is_zero() {
            return capped;
        }
        let jitter = (capped / 4).mul_f64(rand::rng().random::<f64>());
        capped.saturating_add(jitter)
    }
}
