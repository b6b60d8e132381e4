//! Transfer Lifecycle Engine
//!
//! Creates, reads and updates transfers and answers balance queries.
//! Every operation is timed and counted; creation also launches a
//! [`TransferMonitor`](super::monitor::TransferMonitor) for the new id.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::balance::BalanceCalculator;
use super::error::TransferError;
use super::monitor::{MonitorSpawner, TransferLookup};
use super::state::TransferStatus;
use super::store::LedgerStore;
use super::types::{NewTransfer, Transfer, TransferId};
use crate::metrics::{
    CREATE_TRANSFER, GET_ACCOUNT_BALANCE, GET_TRANSFER, OperationTimer, UPDATE_TRANSFER,
};

/// Lifecycle engine
///
/// Cheap to clone: all state sits behind `Arc`s, so each monitor task holds
/// its own handle.
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn LedgerStore>,
    balances: Arc<BalanceCalculator>,
    monitors: MonitorSpawner,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>, monitors: MonitorSpawner) -> Self {
        Self {
            balances: Arc::new(BalanceCalculator::new(store.clone())),
            store,
            monitors,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn monitors(&self) -> &MonitorSpawner {
        &self.monitors
    }

    /// Persist a new `PENDING` transfer and start monitoring it
    ///
    /// No monitor is launched when persistence fails.
    pub async fn create_transfer(&self, req: NewTransfer) -> Result<TransferId, TransferError> {
        let timer = OperationTimer::start(CREATE_TRANSFER);
        timer.finish(self.create_inner(req).await)
    }

    async fn create_inner(&self, req: NewTransfer) -> Result<TransferId, TransferError> {
        req.validate_amount()?;

        let id = self.store.insert(&req).await.map_err(|e| {
            warn!(
                from = %req.from_account,
                to = %req.to_account,
                error = %e,
                "Failed to persist transfer"
            );
            e
        })?;

        info!(
            transfer_id = %id,
            from = %req.from_account,
            to = %req.to_account,
            amount = %req.amount,
            currency = %req.currency,
            "Transfer created"
        );

        // Fire-and-forget: the handle is dropped, the task keeps running
        let _ = self.monitors.spawn(self.clone(), id.clone());
        Ok(id)
    }

    /// Fetch the current record
    pub async fn get_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        let timer = OperationTimer::start(GET_TRANSFER);
        timer.finish(self.store.find_by_id(id).await)
    }

    /// Net balance from completed transfers
    pub async fn get_account_balance(&self, account: &str) -> Result<Decimal, TransferError> {
        let timer = OperationTimer::start(GET_ACCOUNT_BALANCE);
        timer.finish(self.balances.balance_of(account).await)
    }

    /// Apply a status reported by the payment provider
    ///
    /// The status string is validated before the store is touched. Any
    /// valid status may be applied from any state, including re-applying
    /// the current one.
    pub async fn update_transfer_status(
        &self,
        id: &TransferId,
        status: &str,
    ) -> Result<(), TransferError> {
        let timer = OperationTimer::start(UPDATE_TRANSFER);
        timer.finish(self.update_inner(id, status).await)
    }

    async fn update_inner(&self, id: &TransferId, status: &str) -> Result<(), TransferError> {
        let status: TransferStatus = status.parse()?;
        self.store.update_status(id, status).await?;
        debug!(transfer_id = %id, status = %status, "Transfer status updated");
        Ok(())
    }
}

#[async_trait]
impl TransferLookup for TransferService {
    async fn get_transfer(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        TransferService::get_transfer(self, id).await
    }
}
