//! Shared types for the balance watcher.
//!
//! Contains the account/balance data model, the per-cycle report and the
//! domain error taxonomy used across the fetcher, poller and scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Accounts & balances
// ---------------------------------------------------------------------------

/// An item configured to track one bank account's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedAccount {
    /// Item identifier owned by the registry.
    pub item_name: String,
    /// Bank account number as it appears in the statement feed.
    pub account_id: String,
}

impl WatchedAccount {
    pub fn new(item_name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            account_id: account_id.into(),
        }
    }
}

/// Closing balance exactly as received from the feed.
///
/// `value` is kept as text so that no precision is lost between the feed
/// and the published string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBalance {
    pub value: String,
    pub currency: String,
}

// ---------------------------------------------------------------------------
// Cycle reporting
// ---------------------------------------------------------------------------

/// Summary of one pass over all watched accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub polled: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// True if shutdown interrupted the cycle before every account was polled.
    pub cancelled: bool,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{}: polled={} updated={} unchanged={} failed={}{}",
            self.cycle,
            self.polled,
            self.updated,
            self.unchanged,
            self.failed,
            if self.cancelled { " (cancelled)" } else { "" },
        )
    }
}

/// Lifecycle of the poll scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { cycle: u64 },
    Stopped,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Outcome of a single failed attempt against the statement feed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The feed throttled the request (HTTP 409 / 429).
    #[error("Rate limited by statement feed (HTTP {0})")]
    RateLimited(u16),

    /// Transport failure or any non-success status other than rate limiting.
    #[error("Network error: {0}")]
    Network(String),

    /// Statement could not be read or did not contain the expected record.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failure of a resolve after rate limiting has been absorbed.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(FetchError),

    #[error("Polling cancelled by shutdown")]
    Cancelled,
}

/// The item state store does not know the requested item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot find item {0} in item registry")]
pub struct ItemLookupError(pub String);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_display() {
        let report = CycleReport {
            cycle: 3,
            polled: 2,
            updated: 1,
            unchanged: 1,
            failed: 0,
            cancelled: false,
        };
        assert_eq!(
            report.to_string(),
            "Cycle #3: polled=2 updated=1 unchanged=1 failed=0"
        );
    }

    #[test]
    fn test_cycle_report_display_cancelled() {
        let report = CycleReport {
            cycle: 1,
            cancelled: true,
            ..Default::default()
        };
        assert!(report.to_string().ends_with("(cancelled)"));
    }

    #[test]
    fn test_poll_error_is_transparent() {
        let err = PollError::Fetch(FetchError::Network("connection refused".into()));
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_item_lookup_error_message() {
        let err = ItemLookupError("FioBalance".into());
        assert_eq!(err.to_string(), "Cannot find item FioBalance in item registry");
    }

    #[test]
    fn test_watched_account_new() {
        let acc = WatchedAccount::new("FioBalance", "2000000000");
        assert_eq!(acc.item_name, "FioBalance");
        assert_eq!(acc.account_id, "2000000000");
    }
}
