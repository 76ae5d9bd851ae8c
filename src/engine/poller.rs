//! Rate-limit aware balance resolution.
//!
//! Wraps a `BalanceSource` with the feed's throttling policy: a rate-limited
//! attempt is retried after a fixed backoff, without an attempt limit, until
//! the feed answers with something else or shutdown is triggered. Any other
//! failure is returned to the caller on the first attempt.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::shutdown::Shutdown;
use crate::bank::BalanceSource;
use crate::money;
use crate::types::{FetchError, PollError};

/// Fixed wait between rate-limited attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Wait strategy between rate-limited attempts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backoff: Send + Sync {
    async fn wait(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioBackoff;

#[async_trait]
impl Backoff for TokioBackoff {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Resolves an account's formatted balance, absorbing rate limiting.
pub struct RetryingPoller {
    source: Arc<dyn BalanceSource>,
    backoff: Arc<dyn Backoff>,
    retry_delay: Duration,
}

impl RetryingPoller {
    pub fn new(source: Arc<dyn BalanceSource>) -> Self {
        Self {
            source,
            backoff: Arc::new(TokioBackoff),
            retry_delay: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn source(&self) -> &Arc<dyn BalanceSource> {
        &self.source
    }

    /// Fetch and format the balance of `account_id` for `date`.
    ///
    /// Never returns a rate-limit failure. Returns `PollError::Cancelled`
    /// within one backoff interval of `shutdown` being triggered.
    pub async fn resolve(
        &self,
        account_id: &str,
        date: NaiveDate,
        shutdown: &Shutdown,
    ) -> Result<String, PollError> {
        let mut attempt: u32 = 0;

        loop {
            if shutdown.is_triggered() {
                return Err(PollError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                r = self.source.fetch_balance(account_id, date) => r,
                _ = shutdown.triggered() => return Err(PollError::Cancelled),
            };

            match result {
                Ok(raw) => {
                    let formatted = money::format_balance(&raw);
                    debug!(account_id, attempt, balance = %formatted, "Balance resolved");
                    return Ok(formatted);
                }
                Err(FetchError::RateLimited(status)) => {
                    warn!(
                        account_id,
                        attempt,
                        status,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        "Statement feed rate limited, retrying"
                    );
                    tokio::select! {
                        _ = self.backoff.wait(self.retry_delay) => {}
                        _ = shutdown.triggered() => return Err(PollError::Cancelled),
                    }
                }
                Err(e) => return Err(PollError::Fetch(e)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::MockBalanceSource;
    use crate::engine::shutdown;
    use crate::types::RawBalance;
    use mockall::predicate::*;
    use mockall::Sequence;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn balance(value: &str) -> RawBalance {
        RawBalance {
            value: value.into(),
            currency: "CZK".into(),
        }
    }

    #[tokio::test]
    async fn test_success_is_formatted() {
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .with(eq("2000000000"), eq(today()))
            .times(1)
            .returning(|_, _| Ok(balance("1234.50")));
        let mut backoff = MockBackoff::new();
        backoff.expect_wait().never();

        let poller = RetryingPoller::new(Arc::new(source)).with_backoff(Arc::new(backoff));
        let (_trigger, shutdown) = shutdown::channel();

        let value = poller.resolve("2000000000", today(), &shutdown).await.unwrap();
        assert_eq!(value, "1 234.50 CZK");
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_succeeds() {
        let mut seq = Sequence::new();
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(FetchError::RateLimited(409)));
        source
            .expect_fetch_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(balance("100")));

        let mut backoff = MockBackoff::new();
        backoff
            .expect_wait()
            .with(eq(DEFAULT_RETRY_BACKOFF))
            .times(2)
            .returning(|_| ());

        let poller = RetryingPoller::new(Arc::new(source)).with_backoff(Arc::new(backoff));
        let (_trigger, shutdown) = shutdown::channel();

        let value = poller.resolve("1", today(), &shutdown).await.unwrap();
        assert_eq!(value, "100 CZK");
    }

    #[tokio::test]
    async fn test_network_error_is_not_retried() {
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .times(1)
            .returning(|_, _| Err(FetchError::Network("connection reset".into())));
        let mut backoff = MockBackoff::new();
        backoff.expect_wait().never();

        let poller = RetryingPoller::new(Arc::new(source)).with_backoff(Arc::new(backoff));
        let (_trigger, shutdown) = shutdown::channel();

        let err = poller.resolve("1", today(), &shutdown).await.unwrap_err();
        assert!(matches!(err, PollError::Fetch(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_parse_error_is_not_retried() {
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .times(1)
            .returning(|_, _| Err(FetchError::Parse("Account 1 not found".into())));

        let poller = RetryingPoller::new(Arc::new(source));
        let (_trigger, shutdown) = shutdown::channel();

        let err = poller.resolve("1", today(), &shutdown).await.unwrap_err();
        assert!(matches!(err, PollError::Fetch(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_cancel_during_endless_rate_limit() {
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .returning(|_, _| Err(FetchError::RateLimited(409)));

        // Real tokio backoff with the production delay.
        let poller = Arc::new(RetryingPoller::new(Arc::new(source)));
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn({
            let poller = poller.clone();
            async move { poller.resolve("1", today(), &shutdown).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("resolve should stop well within one backoff interval")
            .unwrap();
        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_fetch() {
        let mut source = MockBalanceSource::new();
        source.expect_fetch_balance().never();

        let poller = RetryingPoller::new(Arc::new(source));
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();

        let result = poller.resolve("1", today(), &shutdown).await;
        assert!(matches!(result, Err(PollError::Cancelled)));
    }

    #[tokio::test]
    async fn test_custom_retry_delay_is_used() {
        let mut seq = Sequence::new();
        let mut source = MockBalanceSource::new();
        source
            .expect_fetch_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(FetchError::RateLimited(429)));
        source
            .expect_fetch_balance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(balance("-1")));

        let mut backoff = MockBackoff::new();
        backoff
            .expect_wait()
            .with(eq(Duration::from_millis(250)))
            .times(1)
            .returning(|_| ());

        let poller = RetryingPoller::new(Arc::new(source))
            .with_backoff(Arc::new(backoff))
            .with_retry_delay(Duration::from_millis(250));
        let (_trigger, shutdown) = shutdown::channel();

        assert_eq!(poller.resolve("1", today(), &shutdown).await.unwrap(), "-1 CZK");
    }
}
