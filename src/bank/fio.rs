//! Fio banka REST statement feed.
//!
//! API docs: https://www.fio.cz/docs/cz/API_Bankovnictvi.pdf
//! Endpoint: `https://www.fio.cz/ib_api/rest/periods/{token}/{from}/{to}/transactions.xml`
//! Rate limit: one request per token every 30 seconds; excess requests get HTTP 409.
//! Auth: the access token is part of the URL path, so URLs are never logged.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, trace};

use super::statement::AccountStatement;
use super::BalanceSource;
use crate::types::{FetchError, RawBalance};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheme and host of the production feed.
pub const DEFAULT_BASE_URL: &str = "https://www.fio.cz";

/// Date format used in the statement period path segments.
const DATE_FORMAT: &str = "%Y-%m-%d";

const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fio statement feed client.
pub struct FioClient {
    http: Client,
    token: SecretString,
    base_url: String,
}

impl fmt::Debug for FioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FioClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FioClient {
    /// Create a new client for `base_url` (e.g. `https://www.fio.cz`).
    pub fn new(token: SecretString, base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("fio-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Fio")?;

        Ok(Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Statement URL for a single-day period. Contains the token.
    fn statement_url(&self, date: NaiveDate) -> String {
        let day = date.format(DATE_FORMAT);
        format!(
            "{}/ib_api/rest/periods/{}/{day}/{day}/transactions.xml",
            self.base_url,
            urlencoding::encode(self.token.expose_secret()),
        )
    }

    /// Download and parse the statement for `date`.
    async fn fetch_statement(&self, date: NaiveDate) -> Result<AccountStatement, FetchError> {
        debug!(base_url = %self.base_url, %date, "Fetching Fio statement");

        let resp = self
            .http
            .get(self.statement_url(date))
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        if let Some(code) = rate_limit_status(status) {
            return Err(FetchError::RateLimited(code));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("Fio API error {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;
        trace!(body = %body, "Fio statement body");

        AccountStatement::parse(&body)
    }
}

/// The feed answers throttled requests with 409 Conflict; 429 is treated alike.
fn rate_limit_status(status: StatusCode) -> Option<u16> {
    match status {
        StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS => Some(status.as_u16()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// BalanceSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl BalanceSource for FioClient {
    async fn fetch_balance(
        &self,
        account_id: &str,
        date: NaiveDate,
    ) -> Result<RawBalance, FetchError> {
        let balance = self.fetch_statement(date).await?.balance_for(account_id)?;
        debug!(
            account_id,
            value = %balance.value,
            currency = %balance.currency,
            "Fio balance fetched"
        );
        Ok(balance)
    }

    async fn fetch_primary_account_id(&self, date: NaiveDate) -> Result<String, FetchError> {
        let account_id = self.fetch_statement(date).await?.primary_account_id()?;
        debug!(account_id = %account_id, "Fio primary account fetched");
        Ok(account_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
