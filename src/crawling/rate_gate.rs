//! Shared token bucket gating every fetch, listing and detail alike

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigurationError;
use crate::infrastructure::config::CrawlSettings;

pub struct RateGate {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_second: u32,
}

impl RateGate {
    pub fn new(per_second: u32, burst: u32) -> Result<Self, ConfigurationError> {
        let rate = NonZeroU32::new(per_second).ok_or_else(|| {
            ConfigurationError::invalid_value("crawl.requests_per_second", "must be greater than 0")
        })?;
        let burst = NonZeroU32::new(burst)
            .ok_or_else(|| ConfigurationError::invalid_value("crawl.burst", "must be greater than 0"))?;

        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
            per_second,
        })
    }

    pub fn from_settings(settings: &CrawlSettings) -> Result<Self, ConfigurationError> {
        Self::new(settings.requests_per_second, settings.burst)
    }

    pub const fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Wait for a token. Returns `false` when the run was cancelled first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.limiter.until_ready() => true,
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate").field("per_second", &self.per_second).finish()
    }
}
