//! Metrics definitions for the ledger service.
//!
//! Metrics are recorded with the `metrics` crate into a process-wide
//! recorder installed once at startup and scraped from `/metrics` via
//! `metrics-exporter-prometheus`. Nothing in the service reads them back.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::transfer::TransferError;

pub const CREATE_TRANSFER: &str = "create_transfer";
pub const GET_TRANSFER: &str = "get_transfer";
pub const GET_ACCOUNT_BALANCE: &str = "get_account_balance";
pub const UPDATE_TRANSFER: &str = "update_transfer";

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "service_operations_total",
        "Total number of service operations by type and status"
    );
    describe_histogram!(
        "service_operation_duration_seconds",
        "Duration of service operations in seconds"
    );
    describe_counter!(
        "transfer_monitor_attempts_total",
        "Total attempts made by the transfer monitor"
    );
}

/// Outcome label of one engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    NotFound,
}

impl Outcome {
    /// Classify from the structured error kind
    pub fn of<T>(result: &Result<T, TransferError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) if e.is_not_found() => Outcome::NotFound,
            Err(_) => Outcome::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::NotFound => "not_found",
        }
    }
}

/// Record one completed engine operation.
pub fn record_operation(operation: &'static str, outcome: Outcome) {
    counter!("service_operations_total", "operation" => operation, "status" => outcome.as_str())
        .increment(1);
}

/// Record engine operation duration.
pub fn record_operation_duration(operation: &'static str, outcome: Outcome, duration_secs: f64) {
    histogram!(
        "service_operation_duration_seconds",
        "operation" => operation,
        "status" => outcome.as_str()
    )
    .record(duration_secs);
}

/// Record one transfer monitor observation.
///
/// # Arguments
/// * `transfer_id` - The monitored transfer
/// * `attempt` - 1-based attempt number
/// * `result` - `still_pending`, `error`, `success` or `max_attempts_reached`
pub fn record_monitor_attempt(transfer_id: &str, attempt: u32, result: &'static str) {
    counter!(
        "transfer_monitor_attempts_total",
        "transfer_id" => transfer_id.to_string(),
        "attempt_number" => attempt.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Times one engine operation and records it with its final outcome.
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    /// Start a new operation timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Record counter and duration, then hand the result back.
    pub fn finish<T>(self, result: Result<T, TransferError>) -> Result<T, TransferError> {
        let outcome = Outcome::of(&result);
        record_operation(self.operation, outcome);
        record_operation_duration(self.operation, outcome, self.start.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let ok: Result<(), TransferError> = Ok(());
        assert_eq!(Outcome::of(&ok), Outcome::Success);

        let missing: Result<(), TransferError> = Err(TransferError::NotFound("x".into()));
        assert_eq!(Outcome::of(&missing), Outcome::NotFound);

        let no_account: Result<(), TransferError> =
            Err(TransferError::AccountNotFound("a".into()));
        assert_eq!(Outcome::of(&no_account), Outcome::NotFound);

        let invalid: Result<(), TransferError> = Err(TransferError::InvalidStatus("X".into()));
        assert_eq!(Outcome::of(&invalid), Outcome::Failure);
    }

    #[test]
    fn test_timer_passes_result_through() {
        // No recorder installed: recording is a no-op
        let result = OperationTimer::start(GET_TRANSFER).finish(Ok::<u32, TransferError>(7));
        assert_eq!(result.unwrap(), 7);
    }
}
