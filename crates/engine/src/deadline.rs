//! Request-wide time budget shared by every blocking step.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Stand-in expiry for budgets that overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Point in time by which the whole request must finish.
///
/// Created once per request and passed by reference through each stage, so the
/// fetches, uploads, compiler run and submission all draw on one budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

#[derive(Debug, Clone, Copy, Error)]
#[error("request deadline of {budget_ms}ms exceeded")]
pub struct DeadlineExceeded {
    pub budget_ms: u64,
}

impl Deadline {
    /// A budget too large to represent never expires in practice.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE);
        Self { expires_at, budget }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn budget_ms(&self) -> u64 {
        u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX)
    }

    /// Await `future`, giving up when the deadline passes.
    pub async fn bound<F: Future>(&self, future: F) -> Result<F::Output, DeadlineExceeded> {
        tokio::time::timeout_at(self.expires_at, future)
            .await
            .map_err(|_| DeadlineExceeded {
                budget_ms: self.budget_ms(),
            })
    }
}
