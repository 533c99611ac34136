//! Sliding-window admission control for LLM reranking.
//!
//! Two simultaneous constraints over one rolling window: request count and
//! cumulative cost. Rejection carries a retry hint derived from the record
//! whose expiry frees the constraint.


use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::constants::RATE_LIMIT_WINDOW_SECS;

#[derive(Debug, Error)]
/// Admission rejection, with a hint for when a retry can succeed.
pub enum RateLimitError {
    /// The request-count cap is exhausted.
    #[error("request rate limit exceeded: {current}/{max} requests in window")]
    RequestLimitExceeded {
        /// Requests currently in the window.
        current: usize,
        /// Request cap.
        max: usize,
        /// Time until the oldest record leaves the window.
        retry_after: Duration,
    },

    /// The cost budget is exhausted.
    #[error("budget limit exceeded: {projected_cents:.2}/{max_cents:.2} cents in window")]
    BudgetExceeded {
        /// Window cost including this request.
        projected_cents: f64,
        /// Budget cap in cents.
        max_cents: f64,
        /// Time until enough budget frees up; zero when the request can
        /// never succeed.
        retry_after: Duration,
    },
}

impl RateLimitError {
    /// Seconds until a retry can succeed.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::RequestLimitExceeded { retry_after, .. } => *retry_after,
            RateLimitError::BudgetExceeded { retry_after, .. } => *retry_after,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    timestamp: Instant,
    cost_cents: f64,
}

/// Current window utilisation.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterUsage {
    /// Requests in the window.
    pub request_count: usize,
    /// Request cap.
    pub max_requests: usize,
    /// Cost in the window, in cents.
    pub total_cost_cents: f64,
    /// Budget cap in cents.
    pub max_budget_cents: f64,
}

impl RateLimiterUsage {
    /// Request-cap utilisation in percent.
    pub fn request_utilization(&self) -> f64 {
        if self.max_requests == 0 {
            return 100.0;
        }
        self.request_count as f64 / self.max_requests as f64 * 100.0
    }

    /// Budget utilisation in percent.
    pub fn budget_utilization(&self) -> f64 {
        if self.max_budget_cents == 0.0 {
            return 100.0;
        }
        self.total_cost_cents / self.max_budget_cents * 100.0
    }
}

/// Thread-safe sliding-window limiter over request count and cost.
pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    max_budget_cents: f64,
    window: Duration,
    records: Mutex<VecDeque<RequestRecord>>,
}

impl SlidingWindowRateLimiter {
    /// Creates a limiter with the default one-hour window.
    pub fn new(max_requests_per_hour: usize, max_budget_cents_per_hour: u32) -> Self {
        Self::with_window(
            max_requests_per_hour,
            max_budget_cents_per_hour,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )
    }

    /// Creates a limiter with an explicit window length.
    pub fn with_window(max_requests: usize, max_budget_cents: u32, window: Duration) -> Self {
        Self {
            max_requests,
            max_budget_cents: max_budget_cents as f64,
            window,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Checks both constraints and records the request when admitted.
    ///
    /// Rejection has no side effects: nothing is appended and nothing beyond
    /// window pruning is mutated.
    pub fn check_and_record(&self, cost_cents: f64) -> Result<(), RateLimitError> {
        self.check_and_record_at(cost_cents, Instant::now())
    }

    pub(crate) fn check_and_record_at(
        &self,
        cost_cents: f64,
        now: Instant,
    ) -> Result<(), RateLimitError> {
        let mut records = self.records.lock();

        Self::prune(&mut records, now, self.window);

        let request_count = records.len();
        let total_cost: f64 = records.iter().map(|r| r.cost_cents).sum();

        if request_count >= self.max_requests {
            let oldest = records
                .front()
                .map(|r| r.timestamp)
                .unwrap_or(now);

            return Err(RateLimitError::RequestLimitExceeded {
                current: request_count,
                max: self.max_requests,
                retry_after: remaining(oldest, now, self.window),
            });
        }

        if total_cost + cost_cents > self.max_budget_cents {
            // A request costing more than the whole budget can never be
            // admitted, regardless of what expires.
            if cost_cents > self.max_budget_cents {
                return Err(RateLimitError::BudgetExceeded {
                    projected_cents: cost_cents,
                    max_cents: self.max_budget_cents,
                    retry_after: Duration::ZERO,
                });
            }

            let needed = total_cost + cost_cents - self.max_budget_cents;
            let mut freed = 0.0;
            let mut retry_after = Duration::ZERO;

            for record in records.iter() {
                freed += record.cost_cents;
                if freed >= needed {
                    retry_after = remaining(record.timestamp, now, self.window);
                    break;
                }
            }

            return Err(RateLimitError::BudgetExceeded {
                projected_cents: total_cost + cost_cents,
                max_cents: self.max_budget_cents,
                retry_after,
            });
        }

        records.push_back(RequestRecord {
            timestamp: now,
            cost_cents,
        });

        Ok(())
    }

    /// Current window utilisation.
    pub fn usage(&self) -> RateLimiterUsage {
        self.usage_at(Instant::now())
    }

    pub(crate) fn usage_at(&self, now: Instant) -> RateLimiterUsage {
        let mut records = self.records.lock();
        Self::prune(&mut records, now, self.window);

        RateLimiterUsage {
            request_count: records.len(),
            max_requests: self.max_requests,
            total_cost_cents: records.iter().map(|r| r.cost_cents).sum(),
            max_budget_cents: self.max_budget_cents,
        }
    }

    /// Drops every record.
    pub fn reset(&self) {
        self.records.lock().clear();
    }

    fn prune(records: &mut VecDeque<RequestRecord>, now: Instant, window: Duration) {
        while let Some(front) = records.front() {
            if now.duration_since(front.timestamp) >= window {
                records.pop_front();
            } else {
                break;
            }
        }
    }
}

fn remaining(timestamp: Instant, now: Instant, window: Duration) -> Duration {
    (timestamp + window).saturating_duration_since(now)
}
