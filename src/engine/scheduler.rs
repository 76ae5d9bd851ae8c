//! Periodic poll scheduler.
//!
//! Owns the refresh timer and the lifecycle of the single background task
//! that drives polling. Each tick is one poll cycle: every watched account
//! is resolved in turn and its item is updated only when the balance
//! changed. Per-account failures are logged and never end the cycle.

use anyhow::Result;
use chrono::Local;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::detector::ChangeDetector;
use super::poller::RetryingPoller;
use super::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::items::{ItemRegistry, ItemStateStore};
use crate::types::{CycleReport, FetchError, PollError, SchedulerState};

/// Default interval between poll cycles.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(60_000);

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct PollScheduler {
    poller: RetryingPoller,
    detector: ChangeDetector,
    registry: Arc<dyn ItemRegistry>,
    refresh: Duration,
}

impl PollScheduler {
    pub fn new(
        poller: RetryingPoller,
        registry: Arc<dyn ItemRegistry>,
        store: Arc<dyn ItemStateStore>,
    ) -> Self {
        Self {
            poller,
            detector: ChangeDetector::new(store),
            registry,
            refresh: DEFAULT_REFRESH,
        }
    }

    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Log the feed's primary account if no watched item is bound to it.
    ///
    /// Single attempt; failures are logged and otherwise ignored. Returns the
    /// unbound account id when one was reported.
    pub async fn report_unbound_accounts(&self) -> Option<String> {
        let date = Local::now().date_naive();
        let account_id = match self.poller.source().fetch_primary_account_id(date).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Cannot get Fio account number");
                return None;
            }
        };

        let bound = self
            .registry
            .watched_items()
            .iter()
            .any(|w| w.account_id == account_id);
        if bound {
            debug!(account_id = %account_id, "Primary Fio account is bound");
            return None;
        }

        info!(account_id = %account_id, "Found unbound Fio account");
        Some(account_id)
    }

    /// Run one poll cycle over every watched account.
    pub async fn run_cycle(&self, cycle: u64, shutdown: &Shutdown) -> CycleReport {
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        for account in self.registry.watched_items() {
            let date = Local::now().date_naive();
            let value = match self.poller.resolve(&account.account_id, date, shutdown).await {
                Ok(value) => value,
                Err(PollError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(PollError::Fetch(e)) => {
                    report.polled += 1;
                    report.failed += 1;
                    match e {
                        // Indistinguishable from "no statement today" on the feed side.
                        FetchError::Parse(_) => warn!(
                            item = %account.item_name,
                            account_id = %account.account_id,
                            error = %e,
                            "No Fio balance this cycle"
                        ),
                        _ => error!(
                            item = %account.item_name,
                            account_id = %account.account_id,
                            error = %e,
                            "Cannot get Fio balance"
                        ),
                    }
                    continue;
                }
            };
            report.polled += 1;

            match self.detector.publish_if_changed(&account.item_name, &value) {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(item = %account.item_name, error = %e, "Cannot publish Fio balance");
                }
            }
        }

        report
    }

    /// Spawn the polling task and return immediately.
    ///
    /// The task reports unbound accounts once, then runs a cycle on every
    /// tick until the handle is stopped or dropped.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (trigger, shutdown) = shutdown::channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move { scheduler.run(shutdown, state_tx).await });

        info!(
            refresh_ms = self.refresh.as_millis() as u64,
            "Fio refresh service started"
        );

        SchedulerHandle {
            trigger,
            task,
            state: state_rx,
        }
    }

    async fn run(&self, shutdown: Shutdown, state: watch::Sender<SchedulerState>) {
        tokio::select! {
            _ = self.report_unbound_accounts() => {}
            _ = shutdown.triggered() => {
                state.send_replace(SchedulerState::Stopped);
                return;
            }
        }

        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    cycle += 1;
                    state.send_replace(SchedulerState::Running { cycle });

                    let report = self.run_cycle(cycle, &shutdown).await;
                    log_cycle_report(&report);

                    if report.cancelled {
                        break;
                    }
                    state.send_replace(SchedulerState::Idle);
                }
                _ = shutdown.triggered() => break,
            }
        }

        state.send_replace(SchedulerState::Stopped);
        info!(cycles = cycle, "Fio refresh service stopped");
    }
}

/// Log a one-line cycle summary.
fn log_cycle_report(report: &CycleReport) {
    if report.failed > 0 {
        warn!(cycle = report.cycle, failed = report.failed, "{report}");
    } else {
        info!(cycle = report.cycle, "{report}");
    }
}

// ---------------------------------------------------------------------------
// Handle & activation
// ---------------------------------------------------------------------------

/// Control handle of a started scheduler. Dropping it also stops polling.
pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer, cancel any in-flight retry and wait for the task.
    pub async fn stop(self) {
        self.trigger.trigger();
        if let Err(e) = self.task.await {
            error!(error = %e, "Fio refresh task failed");
        }
    }
}

/// Result of activating the refresh service.
pub enum Activation {
    Active(SchedulerHandle),
    /// No access token: the service stays inactive instead of failing.
    NotConfigured,
}

impl Activation {
    pub fn is_active(&self) -> bool {
        matches!(self, Activation::Active(_))
    }
}

/// Start polling if a token is available.
///
/// `build` constructs the scheduler from the token and is only called when
/// one is present.
pub fn activate<F>(token: Option<SecretString>, build: F) -> Result<Activation>
where
    F: FnOnce(SecretString) -> Result<Arc<PollScheduler>>,
{
    let Some(token) = token else {
        warn!("Fio token not configured, balance polling is inactive");
        return Ok(Activation::NotConfigured);
    };
    let scheduler = build(token)?;
    Ok(Activation::Active(scheduler.start()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
