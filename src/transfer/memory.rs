//! In-Memory Ledger Store
//!
//! `HashMap`-backed [`LedgerStore`] with the same semantics as the
//! PostgreSQL store. Used by tests and by simulation mode when no
//! database is configured. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::error::TransferError;
use super::state::TransferStatus;
use super::store::LedgerStore;
use super::types::{NewTransfer, Transfer, TransferId};

/// In-process ledger store
#[derive(Default)]
pub struct MemoryLedgerStore {
    records: Mutex<HashMap<TransferId, Transfer>>,
    /// Call counters, for verifying which operations reached the store
    insert_count: AtomicUsize,
    find_count: AtomicUsize,
    update_count: AtomicUsize,
    /// When set, every write fails with a storage error
    fail_writes: AtomicBool,
    /// When set, lookups and sums fail with a storage error
    fail_reads: AtomicBool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `insert` / `update_status` calls fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `find_by_id` / `sum_completed_*` calls fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn insert_count(&self) -> usize {
        self.insert_count.load(Ordering::SeqCst)
    }

    pub fn find_count(&self) -> usize {
        self.find_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Number of stored transfers
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<TransferId, Transfer>>, TransferError> {
        self.records
            .lock()
            .map_err(|_| TransferError::Storage("memory ledger lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), TransferError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransferError::Storage(
                "simulated write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<(), TransferError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TransferError::Storage("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn sum_completed<F>(&self, matches: F) -> Result<Option<Decimal>, TransferError>
    where
        F: Fn(&Transfer) -> bool,
    {
        self.check_readable()?;

        // Copy out under the lock, add up after releasing it
        let amounts: Vec<Decimal> = self
            .records()?
            .values()
            .filter(|t| t.status == TransferStatus::Completed && matches(t))
            .map(|t| t.amount)
            .collect();

        amounts.into_iter().try_fold(None, |sum: Option<Decimal>, amount| {
            sum.unwrap_or(Decimal::ZERO)
                .checked_add(amount)
                .map(Some)
                .ok_or_else(|| TransferError::Storage("completed sum overflows".to_string()))
        })
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, transfer: &NewTransfer) -> Result<TransferId, TransferError> {
        self.insert_count.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let id = TransferId::generate();
        let now = Utc::now();
        let record = Transfer {
            id: id.clone(),
            from_account: transfer.from_account.clone(),
            to_account: transfer.to_account.clone(),
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            status: TransferStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut records = self.records()?;
        if records.contains_key(&id) {
            return Err(TransferError::Storage(format!(
                "duplicate transfer_id: {}",
                id
            )));
        }
        records.insert(id.clone(), record);
        Ok(id)
    }

    async fn find_by_id(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        self.find_count.fetch_add(1, Ordering::SeqCst);
        self.check_readable()?;
        self.records()?
            .get(id)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(id.to_string()))
    }

    async fn update_status(
        &self,
        id: &TransferId,
        status: TransferStatus,
    ) -> Result<(), TransferError> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;

        let mut records = self.records()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn sum_completed_inbound(
        &self,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError> {
        self.sum_completed(|t| t.to_account == account)
    }

    async fn sum_completed_outbound(
        &self,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError> {
        self.sum_completed(|t| t.from_account == account)
    }

    async fn health_check(&self) -> Result<(), TransferError> {
        self.records().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_transfer(from: &str, to: &str, cents: i64) -> NewTransfer {
        NewTransfer::new(from, to, Decimal::new(cents, 2), "USD")
    }

    #[tokio::test]
    async fn test_insert_starts_pending() {
        let store = MemoryLedgerStore::new();
        let id = store.insert(&new_transfer("a", "b", 500)).await.unwrap();

        let t = store.find_by_id(&id).await.unwrap();
        assert_eq!(t.status, TransferStatus::Pending);
        assert_eq!(t.amount, Decimal::new(500, 2));
        assert_eq!(t.currency, "USD");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let store = MemoryLedgerStore::new();
        let err = store.find_by_id(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, TransferError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_sums_absent_vs_zero() {
        let store = MemoryLedgerStore::new();
        let id = store.insert(&new_transfer("a", "b", 0)).await.unwrap();

        // Pending rows do not count as matching rows
        assert_eq!(store.sum_completed_inbound("b").await.unwrap(), None);

        store
            .update_status(&id, TransferStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            store.sum_completed_inbound("b").await.unwrap(),
            Some(Decimal::ZERO)
        );
        assert_eq!(store.sum_completed_outbound("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sum_overflow_leaves_store_usable() {
        let store = MemoryLedgerStore::new();
        for _ in 0..2 {
            let id = store
                .insert(&NewTransfer::new("a", "b", Decimal::MAX, "USD"))
                .await
                .unwrap();
            store
                .update_status(&id, TransferStatus::Completed)
                .await
                .unwrap();
        }

        let err = store.sum_completed_inbound("b").await.unwrap_err();
        assert!(matches!(err, TransferError::Storage(ref m) if m.contains("overflow")));

        // Lock not poisoned: every other call still works
        let id = store.insert(&new_transfer("c", "d", 100)).await.unwrap();
        assert!(store.find_by_id(&id).await.is_ok());
        assert_eq!(
            store.sum_completed_outbound("a").await.unwrap_err().code(),
            "STORAGE_ERROR"
        );
        assert_eq!(store.sum_completed_inbound("d").await.unwrap(), None);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let store = MemoryLedgerStore::new();
        let id = store.insert(&new_transfer("a", "b", 100)).await.unwrap();
        store.set_fail_reads(true);

        assert!(matches!(
            store.find_by_id(&id).await,
            Err(TransferError::Storage(_))
        ));
        assert!(matches!(
            store.sum_completed_inbound("b").await,
            Err(TransferError::Storage(_))
        ));

        store.set_fail_reads(false);
        assert!(store.find_by_id(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryLedgerStore::new();
        store.set_fail_writes(true);

        let err = store.insert(&new_transfer("a", "b", 100)).await.unwrap_err();
        assert!(matches!(err, TransferError::Storage(_)));
        assert!(store.is_empty());
        assert_eq!(store.insert_count(), 1);
    }
}
