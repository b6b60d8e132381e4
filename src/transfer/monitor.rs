//! Transfer Monitor
//!
//! Background task launched once per created transfer. It polls the
//! transfer until it leaves `PENDING` or the attempt budget runs out,
//! recording one observation per attempt. It never reports back to the
//! creator: errors become observations.
//!
//! # State Machine
//!
//! ```text
//! ATTEMPTING(1) → ATTEMPTING(2) → … → ATTEMPTING(max)
//!      │               │                   │
//!      ├── resolved ───┴──→ RESOLVED       ├── still pending → EXHAUSTED
//!      └── fetch error ───→ ERRORED        └── resolved / error as left
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::TransferError;
use super::state::TransferStatus;
use super::types::{Transfer, TransferId};
use crate::metrics::record_monitor_attempt;

/// Read access the monitor needs from the lifecycle engine
#[async_trait]
pub trait TransferLookup: Send + Sync + 'static {
    async fn get_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError>;
}

/// Polling policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// Polls before giving up on a pending transfer
    pub max_attempts: u32,
    /// Wait after the first attempt
    pub base_delay: Duration,
    /// Added to the wait after each further attempt
    pub step: Duration,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            step: Duration::from_secs(2),
        }
    }
}

impl MonitorPolicy {
    /// Wait between attempt `attempt` and `attempt + 1` (1-based)
    ///
    /// Linear: base, base + step, base + 2·step, …
    /// Saturates at `Duration::MAX` for oversized policies.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.step
            .checked_mul(attempt.saturating_sub(1))
            .and_then(|extra| self.base_delay.checked_add(extra))
            .unwrap_or(Duration::MAX)
    }
}

/// Observation recorded for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    StillPending,
    Error,
    /// Transfer left `PENDING`
    Success,
    /// Last attempt and still `PENDING`
    MaxAttemptsReached,
}

impl AttemptResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptResult::StillPending => "still_pending",
            AttemptResult::Error => "error",
            AttemptResult::Success => "success",
            AttemptResult::MaxAttemptsReached => "max_attempts_reached",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub result: AttemptResult,
}

/// Terminal state of a monitor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Transfer left `PENDING` with this status
    Resolved(TransferStatus),
    /// Fetching the transfer failed
    Errored,
    /// Still `PENDING` after the last attempt
    Exhausted,
    /// Shutdown requested while waiting
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub transfer_id: TransferId,
    pub outcome: MonitorOutcome,
    /// One entry per poll, in order
    pub attempts: Vec<AttemptRecord>,
}

impl MonitorReport {
    pub fn polls(&self) -> usize {
        self.attempts.len()
    }

    pub fn count(&self, result: AttemptResult) -> usize {
        self.attempts.iter().filter(|a| a.result == result).count()
    }
}

/// Monitor for a single transfer
pub struct TransferMonitor<L> {
    lookup: L,
    policy: MonitorPolicy,
    shutdown: watch::Receiver<bool>,
}

impl<L: TransferLookup> TransferMonitor<L> {
    pub fn new(lookup: L, policy: MonitorPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            lookup,
            policy,
            shutdown,
        }
    }

    /// Run until a terminal state is reached
    pub async fn run(mut self, transfer_id: TransferId) -> MonitorReport {
        let mut attempts = Vec::new();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if *self.shutdown.borrow() {
                return self.finish(transfer_id, MonitorOutcome::Cancelled, attempts);
            }

            let (result, outcome) = match self.lookup.get_transfer(&transfer_id).await {
                Err(e) => {
                    warn!(
                        transfer_id = %transfer_id,
                        attempt = attempt,
                        error = %e,
                        "Monitor failed to fetch transfer"
                    );
                    (AttemptResult::Error, Some(MonitorOutcome::Errored))
                }
                Ok(t) if !t.status.is_pending() => (
                    AttemptResult::Success,
                    Some(MonitorOutcome::Resolved(t.status)),
                ),
                Ok(_) if attempt == max_attempts => (
                    AttemptResult::MaxAttemptsReached,
                    Some(MonitorOutcome::Exhausted),
                ),
                Ok(_) => (AttemptResult::StillPending, None),
            };

            record_monitor_attempt(transfer_id.as_str(), attempt, result.as_str());
            attempts.push(AttemptRecord { attempt, result });

            if let Some(outcome) = outcome {
                return self.finish(transfer_id, outcome, attempts);
            }

            let delay = self.policy.backoff_after(attempt);
            debug!(
                transfer_id = %transfer_id,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Transfer still pending"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut self.shutdown) => {
                    return self.finish(transfer_id, MonitorOutcome::Cancelled, attempts);
                }
            }
        }

        // max_attempts >= 1, so the last iteration always returns
        self.finish(transfer_id, MonitorOutcome::Exhausted, attempts)
    }

    fn finish(
        &self,
        transfer_id: TransferId,
        outcome: MonitorOutcome,
        attempts: Vec<AttemptRecord>,
    ) -> MonitorReport {
        match &outcome {
            MonitorOutcome::Resolved(status) => info!(
                transfer_id = %transfer_id,
                status = %status,
                attempts = attempts.len(),
                "Transfer resolved"
            ),
            MonitorOutcome::Exhausted => warn!(
                transfer_id = %transfer_id,
                attempts = attempts.len(),
                "Transfer still pending after max attempts"
            ),
            MonitorOutcome::Errored => {}
            MonitorOutcome::Cancelled => debug!(
                transfer_id = %transfer_id,
                attempts = attempts.len(),
                "Monitor cancelled by shutdown"
            ),
        }

        MonitorReport {
            transfer_id,
            outcome,
            attempts,
        }
    }
}

/// Resolves once shutdown is signalled; never if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Launches monitors onto the tokio runtime
///
/// A semaphore bounds how many monitors poll at once; monitors over the
/// bound wait for a permit inside their own task, so launching never
/// blocks the caller.
#[derive(Clone)]
pub struct MonitorSpawner {
    policy: MonitorPolicy,
    permits: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
    launched: Arc<AtomicU64>,
    live: Arc<AtomicUsize>,
}

impl MonitorSpawner {
    /// Default bound on concurrently polling monitors
    pub const DEFAULT_MAX_CONCURRENT: usize = 1024;

    pub fn new(policy: MonitorPolicy, max_concurrent: usize) -> Self {
        // Sender dropped right away: without `with_shutdown` nothing cancels
        let (_tx, shutdown) = watch::channel(false);
        Self {
            policy,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown,
            launched: Arc::new(AtomicU64::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Cancel waiting monitors when `true` is sent on this channel
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn policy(&self) -> &MonitorPolicy {
        &self.policy
    }

    /// Monitors launched since startup
    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::SeqCst)
    }

    /// Monitors not yet finished (polling or waiting for a permit)
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Launch one monitor; the handle may be dropped (fire-and-forget)
    pub fn spawn<L: TransferLookup>(
        &self,
        lookup: L,
        transfer_id: TransferId,
    ) -> JoinHandle<MonitorReport> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let live = LiveGuard::enter(self.live.clone());

        let permits = self.permits.clone();
        let monitor = TransferMonitor::new(lookup, self.policy.clone(), self.shutdown.clone());

        tokio::spawn(async move {
            let _live = live;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return MonitorReport {
                        transfer_id,
                        outcome: MonitorOutcome::Cancelled,
                        attempts: Vec::new(),
                    };
                }
            };
            monitor.run(transfer_id).await
        })
    }
}

/// Keeps the live-monitor count accurate even if a task panics
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
