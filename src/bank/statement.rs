//! Fio account statement parsing.
//!
//! The feed returns XML shaped like:
//!
//! ```xml
//! <AccountStatement>
//!   <Info>
//!     <accountId>2000000000</accountId>
//!     <currency>CZK</currency>
//!     <closingBalance>1234.56</closingBalance>
//!     ...
//!   </Info>
//!   <TransactionList>...</TransactionList>
//! </AccountStatement>
//! ```
//!
//! Only the `Info` records are deserialized; everything else is ignored.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::money;
use crate::types::{FetchError, RawBalance};

// ---------------------------------------------------------------------------
// XML types (Fio statement → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename = "AccountStatement")]
pub struct AccountStatement {
    #[serde(rename = "Info", default)]
    info: Vec<StatementInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementInfo {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    closing_balance: Option<String>,
    #[serde(default)]
    currency: Option<String>,
}

/// Trimmed, non-empty text of an optional node.
fn text(node: &Option<String>) -> Option<&str> {
    node.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AccountStatement {
    /// Parse a statement document.
    pub fn parse(xml: &str) -> Result<Self, FetchError> {
        quick_xml::de::from_str(xml)
            .map_err(|e| FetchError::Parse(format!("Malformed account statement: {e}")))
    }

    /// Closing balance of the `Info` record whose `accountId` matches.
    pub fn balance_for(&self, account_id: &str) -> Result<RawBalance, FetchError> {
        let info = self
            .info
            .iter()
            .find(|i| text(&i.account_id) == Some(account_id))
            .ok_or_else(|| {
                FetchError::Parse(format!("Account {account_id} not found in statement"))
            })?;

        let value = text(&info.closing_balance).ok_or_else(|| {
            FetchError::Parse(format!("Missing closingBalance for account {account_id}"))
        })?;
        let currency = text(&info.currency).ok_or_else(|| {
            FetchError::Parse(format!("Missing currency for account {account_id}"))
        })?;

        if !money::is_plain_decimal(value) {
            return Err(FetchError::Parse(format!(
                "Invalid closingBalance '{value}' for account {account_id}"
            )));
        }
        Decimal::from_str(value).map_err(|e| {
            FetchError::Parse(format!("Invalid closingBalance '{value}' for account {account_id}: {e}"))
        })?;

        Ok(RawBalance {
            value: value.to_string(),
            currency: currency.to_string(),
        })
    }

    /// Account id of the first `Info` record.
    pub fn primary_account_id(&self) -> Result<String, FetchError> {
        self.info
            .first()
            .and_then(|i| text(&i.account_id))
            .map(str::to_string)
            .ok_or_else(|| FetchError::Parse("No accountId in statement".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
