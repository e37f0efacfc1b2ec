//! Exponential backoff between attempts against one provider.

use formsmith_types::generation::GenerationOptions;

/// Deterministic exponential backoff: `base * 2^(n-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay after failed attempt `failed_attempt` (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> u64 {
        let exponent = failed_attempt.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }

    /// Delay after a failure that carried a provider retry hint.
    ///
    /// The hint can stretch the delay up to the cap, never shorten it.
    pub fn delay_with_hint(&self, failed_attempt: u32, hint_ms: Option<u64>) -> u64 {
        let computed = self.delay_after(failed_attempt);
        match hint_ms {
            Some(hint) => computed.max(hint.min(self.max_ms)),
            None => computed,
        }
    }
}

impl From<&GenerationOptions> for BackoffPolicy {
    fn from(options: &GenerationOptions) -> Self {
        Self::new(options.base_backoff_ms, options.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap() {
        let policy = BackoffPolicy::new(500, 8_000);
        let delays: Vec<u64> = (1..=7).map(|n| policy.delay_after(n)).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 8_000, 8_000, 8_000]);
    }

    #[test]
    fn test_huge_attempt_numbers_saturate() {
        let policy = BackoffPolicy::new(500, 8_000);
        assert_eq!(policy.delay_after(200), 8_000);
        assert_eq!(policy.delay_after(0), 500);
    }

    #[test]
    fn test_hint_stretches_but_is_capped() {
        let policy = BackoffPolicy::new(100, 5_000);
        assert_eq!(policy.delay_with_hint(1, Some(2_000)), 2_000);
        assert_eq!(policy.delay_with_hint(1, Some(60_000)), 5_000);
        assert_eq!(policy.delay_with_hint(3, Some(10)), 400);
        assert_eq!(policy.delay_with_hint(2, None), 200);
    }
}
