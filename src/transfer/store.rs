//! Ledger Store Port
//!
//! The narrow persistence interface the lifecycle engine depends on.
//! Implementations: [`super::db::PgLedgerStore`] (PostgreSQL) and
//! [`super::memory::MemoryLedgerStore`] (in-process).

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::TransferError;
use super::state::TransferStatus;
use super::types::{NewTransfer, Transfer, TransferId};

/// Durable store of transfer records
///
/// The store owns id generation and uniqueness. Single-row updates are
/// assumed atomic; the engine takes no locks of its own.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get store name for logging
    fn name(&self) -> &'static str;

    /// Persist a new record in `PENDING` with a freshly generated id
    async fn insert(&self, transfer: &NewTransfer) -> Result<TransferId, TransferError>;

    /// Fetch a record by external id
    ///
    /// Fails with [`TransferError::NotFound`] when no record matches.
    async fn find_by_id(&self, id: &TransferId) -> Result<Transfer, TransferError>;

    /// Overwrite the status of a record
    ///
    /// Setting the current status again succeeds. Fails with
    /// [`TransferError::NotFound`] when no record matches.
    async fn update_status(
        &self,
        id: &TransferId,
        status: TransferStatus,
    ) -> Result<(), TransferError>;

    /// Sum of `COMPLETED` amounts credited to `account`
    ///
    /// `None` when there are no matching rows, as opposed to a real zero.
    async fn sum_completed_inbound(&self, account: &str)
    -> Result<Option<Decimal>, TransferError>;

    /// Sum of `COMPLETED` amounts debited from `account`
    ///
    /// `None` when there are no matching rows, as opposed to a real zero.
    async fn sum_completed_outbound(
        &self,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError>;

    /// Cheap liveness probe
    async fn health_check(&self) -> Result<(), TransferError>;
}
