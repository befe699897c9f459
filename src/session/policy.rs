use std::time::Duration;

/// Timing knobs for proactive token renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalPolicy {
    /// Renew this long before the access token expires.
    pub lead_time: Duration,
    /// Never schedule sooner than this, unless the token expires first.
    pub min_delay: Duration,
    /// Used when the expiry is unknown or implausibly far away.
    pub fallback_interval: Duration,
    /// Expiries further out than this are treated as unknown.
    pub max_horizon: Duration,
    /// A renewal finished within this window answers new triggers with its outcome.
    pub debounce: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            lead_time: Duration::from_secs(5 * 60),
            min_delay: Duration::from_secs(2 * 60),
            fallback_interval: Duration::from_secs(60 * 60),
            max_horizon: Duration::from_secs(365 * 24 * 60 * 60),
            debounce: Duration::from_secs(30),
        }
    }
}

impl RenewalPolicy {
    #[must_use]
    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    #[must_use]
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    #[must_use]
    pub fn with_fallback_interval(mut self, interval: Duration) -> Self {
        self.fallback_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_horizon(mut self, horizon: Duration) -> Self {
        self.max_horizon = horizon;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// When the next renewal should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalPlan {
    Immediately,
    After(Duration),
}

impl RenewalPlan {
    /// Sleep duration before renewing.
    #[must_use]
    pub fn delay(self) -> Duration {
        match self {
            Self::Immediately => Duration::ZERO,
            Self::After(delay) => delay,
        }
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Plans the next renewal for an access token expiring at `exp_ms`
/// (epoch milliseconds), as seen at `now_ms`.
///
/// With a known, plausible expiry the renewal instant lies in `[now, exp]`.
/// Only an expiry that has already passed renews immediately.
#[must_use]
pub fn plan_renewal(exp_ms: Option<i64>, now_ms: i64, policy: &RenewalPolicy) -> RenewalPlan {
    let Some(exp_ms) = exp_ms else {
        return RenewalPlan::After(policy.fallback_interval);
    };
    if exp_ms > now_ms.saturating_add(millis(policy.max_horizon)) {
        return RenewalPlan::After(policy.fallback_interval);
    }

    let until = exp_ms.saturating_sub(now_ms);
    if until <= 0 {
        return RenewalPlan::Immediately;
    }

    let delay = until
        .saturating_sub(millis(policy.lead_time))
        .max(millis(policy.min_delay))
        .min(until);
    // Non-negative: `min_delay >= 0` and `until > 0`.
    RenewalPlan::After(Duration::from_millis(delay.unsigned_abs()))
}
