// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry policy with exponential backoff.
//!
//! The same policy object is used at both retry levels of the connection
//! manager: session supervision (slow backoff, fatal on exhaustion) and
//! transport establishment (fast backoff, propagates to the session level).

use std::time::Duration;

/// An exponential backoff retry policy.
///
/// An operation is attempted once and then retried up to
/// [`max_retries`](Self::max_retries) times; the delay before retry `n`
/// (0-based) is `factor * 2^n` seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use telelink::connection::RetryPolicy;
///
/// let policy = RetryPolicy::session();
/// assert_eq!(policy.delay(0), Duration::from_secs(2));
/// assert_eq!(policy.delay(4), Duration::from_secs(32));
/// assert!(!policy.should_retry(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base factor of the exponential delay, in seconds.
    pub factor: f64,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    #[must_use]
    pub fn new(max_retries: u32, factor: f64) -> Self {
        Self {
            max_retries,
            factor,
        }
    }

    /// The default session-level policy: 5 retries, delays 2, 4, 8, 16, 32s.
    #[must_use]
    pub fn session() -> Self {
        Self::new(5, 2.0)
    }

    /// The default connect-level policy: 5 retries, delays 0.1 .. 1.6s.
    #[must_use]
    pub fn connect() -> Self {
        Self::new(5, 0.1)
    }

    /// Returns the delay before the given retry (0-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = 2f64.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        Duration::from_secs_f64(self.factor * exp)
    }

    /// Returns true if the given retry (0-based) may be attempted.
    #[must_use]
    pub fn should_retry(&self, retry: u32) -> bool {
        retry < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_backoff_schedule() {
        let policy = RetryPolicy::session();
        let delays: Vec<u64> = (0..policy.max_retries)
            .map(|n| policy.delay(n).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn connect_backoff_schedule() {
        let policy = RetryPolicy::connect();
        let delays: Vec<u64> = (0..policy.max_retries)
            .map(|n| policy.delay(n).as_millis().try_into().unwrap())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn no_retry_after_exhaustion() {
        let policy = RetryPolicy::session();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn custom_policy() {
        let policy = RetryPolicy::new(2, 0.5);
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert!(!policy.should_retry(2));
    }
}
