// gitbrowse-rs: Terminal GitHub Repository Browser
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Backoff policy for rate limits and transport failures.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use super::RateLimitInfo;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then try again.
    Retry(Duration),
    /// Surface the failure to the caller.
    GiveUp,
}

/// Retry constants for the remote client and the download scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First rate-limit wait when headers do not say how long to wait.
    pub rate_limit_base: Duration,
    /// Upper bound for any rate-limit wait, header-derived or computed.
    pub rate_limit_cap: Duration,
    /// Total attempts before surfacing `RateLimited`.
    pub rate_limit_attempts: u32,
    /// First transport retry delay; doubles per retry.
    pub network_base: Duration,
    /// Transport retries after the first attempt.
    pub network_retries: u32,
    /// Honour `retry-after` and `x-ratelimit-reset`.
    pub use_header_waits: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_base: Duration::from_secs(1),
            rate_limit_cap: Duration::from_secs(30),
            rate_limit_attempts: 5,
            network_base: Duration::from_millis(500),
            network_retries: 3,
            use_header_waits: true,
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no sleeping. For tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            rate_limit_base: Duration::ZERO,
            network_base: Duration::ZERO,
            use_header_waits: false,
            ..Self::default()
        }
    }

    /// Decision after the `attempt`-th consecutive rate-limited response
    /// (1-based). `header_wait` is what the response asked for, if anything.
    #[must_use]
    pub fn on_rate_limit(&self, attempt: u32, header_wait: Option<Duration>) -> RetryDecision {
        if attempt >= self.rate_limit_attempts {
            return RetryDecision::GiveUp;
        }
        match header_wait.filter(|_| self.use_header_waits) {
            Some(wait) if wait > self.rate_limit_cap => RetryDecision::GiveUp,
            Some(wait) => RetryDecision::Retry(wait),
            None => RetryDecision::Retry(self.backoff(self.rate_limit_base, attempt)),
        }
    }

    /// Decision after the `failure`-th consecutive transport failure (1-based).
    #[must_use]
    pub fn on_network_failure(&self, failure: u32) -> RetryDecision {
        if failure > self.network_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.backoff(self.network_base, failure))
        }
    }

    fn backoff(&self, base: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(self.rate_limit_cap)
    }
}

/// A response that signals a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// How long the remote asked us to wait, when it said.
    pub wait: Option<Duration>,
}

/// Classifies a response as rate limited: any 429, or a 403 carrying
/// `x-ratelimit-remaining: 0` or `retry-after` (secondary limits).
#[must_use]
pub fn rate_limit_signal(status: StatusCode, headers: &HeaderMap) -> Option<RateLimitSignal> {
    let retry_after = header_u64(headers, "retry-after");
    let exhausted = header_u64(headers, "x-ratelimit-remaining") == Some(0);

    let limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || retry_after.is_some()));
    if !limited {
        return None;
    }

    let wait = retry_after.map(Duration::from_secs).or_else(|| {
        header_u64(headers, "x-ratelimit-reset")
            .filter(|_| exhausted)
            .map(|reset| Duration::from_secs(reset.saturating_sub(unix_now())))
    });
    Some(RateLimitSignal { wait })
}

/// Rate-limit accounting from `x-ratelimit-*` headers.
#[must_use]
pub fn rate_limit_info(headers: &HeaderMap) -> RateLimitInfo {
    RateLimitInfo {
        limit: header_u64(headers, "x-ratelimit-limit"),
        remaining: header_u64(headers, "x-ratelimit-remaining"),
        reset_at: header_u64(headers, "x-ratelimit-reset"),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
