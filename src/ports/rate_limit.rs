use async_trait::async_trait;
use thiserror::Error;

/// Outcome of one token-bucket probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Tokens left in the bucket after this probe. Negative means the probe
    /// was rejected with the bucket already empty.
    pub tokens_remaining: i64,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RateLimitStoreError {
    /// The backing store is unreachable. Callers treat this as allow so a
    /// limiter outage never becomes a full traffic outage.
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Port for the token-bucket state backing the rate limiter plugin.
///
/// `key` identifies one bucket (the matched rule id); `replenish_rate` is
/// tokens added per second and `burst_capacity` the bucket ceiling.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    async fn try_acquire(
        &self,
        key: &str,
        replenish_rate: u32,
        burst_capacity: u32,
    ) -> Result<RateLimitDecision, RateLimitStoreError>;
}
