//! Bank statement feed integration.
//!
//! Defines the `BalanceSource` trait and provides the Fio banka REST
//! implementation (`fio`) together with the XML statement parser
//! (`statement`).

pub mod fio;
pub mod statement;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{FetchError, RawBalance};

/// Abstraction over a balance feed.
///
/// Each call is a single best-effort attempt; retrying is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Closing balance of `account_id` for the statement covering `date`.
    async fn fetch_balance(&self, account_id: &str, date: NaiveDate)
        -> Result<RawBalance, FetchError>;

    /// Account id of the first account listed in the statement for `date`.
    async fn fetch_primary_account_id(&self, date: NaiveDate) -> Result<String, FetchError>;
}
