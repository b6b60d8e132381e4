//! Balance Calculator
//!
//! Derives an account's net balance from completed transfers. Nothing is
//! cached: every call reads the latest committed state from the store.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::error::TransferError;
use super::store::LedgerStore;

pub struct BalanceCalculator {
    store: Arc<dyn LedgerStore>,
}

impl BalanceCalculator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Net balance: completed inbound minus completed outbound
    ///
    /// The two sides are queried independently so an account with only
    /// inflows or only outflows still gets a sum for the side it has.
    /// Fails with [`TransferError::AccountNotFound`] when neither side has
    /// any completed transfer. Negative results are valid (net sender).
    pub async fn balance_of(&self, account: &str) -> Result<Decimal, TransferError> {
        let inbound = self.store.sum_completed_inbound(account).await?;
        let outbound = self.store.sum_completed_outbound(account).await?;

        match (inbound, outbound) {
            (None, None) => Err(TransferError::AccountNotFound(account.to_string())),
            (inbound, outbound) => {
                Ok(inbound.unwrap_or(Decimal::ZERO) - outbound.unwrap_or(Decimal::ZERO))
            }
        }
    }
}
