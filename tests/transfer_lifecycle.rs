use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use transfer_ledger::transfer::{
    AttemptResult, LedgerStore, MemoryLedgerStore, MonitorOutcome, MonitorPolicy,
    MonitorSpawner, NewTransfer, TransferError, TransferService, TransferStatus,
};

/// Service over a fresh memory ledger with default monitor policy
fn setup() -> (TransferService, Arc<MemoryLedgerStore>) {
    let store = Arc::new(MemoryLedgerStore::new());
    let monitors = MonitorSpawner::new(MonitorPolicy::default(), 64);
    (TransferService::new(store.clone(), monitors), store)
}

fn usd(from: &str, to: &str, cents: i64) -> NewTransfer {
    NewTransfer::new(from, to, Decimal::new(cents, 2), "USD")
}

#[tokio::test(start_paused = true)]
async fn scenario_create_settle_and_balance() {
    let (svc, _) = setup();

    let id = svc
        .create_transfer(usd("acc-001", "acc-002", 10000))
        .await
        .unwrap();
    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Pending
    );

    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Completed
    );

    assert_eq!(
        svc.get_account_balance("acc-002").await.unwrap(),
        Decimal::new(10000, 2)
    );
    assert_eq!(
        svc.get_account_balance("acc-001").await.unwrap(),
        Decimal::new(-10000, 2)
    );
}

#[tokio::test(start_paused = true)]
async fn ids_are_unique_across_many_creates() {
    let (svc, store) = setup();

    let mut ids = HashSet::new();
    for i in 0..500 {
        let id = svc
            .create_transfer(usd("acc-a", "acc-b", i + 1))
            .await
            .unwrap();
        assert!(ids.insert(id));
    }
    assert_eq!(store.len(), 500);
    assert_eq!(svc.monitors().launched(), 500);
}

#[tokio::test(start_paused = true)]
async fn balances_add_up_across_directions() {
    let (svc, _) = setup();

    for (from, to, cents) in [
        ("acc-x", "acc-m", 5000),
        ("acc-y", "acc-m", 2550),
        ("acc-m", "acc-z", 1000),
    ] {
        let id = svc.create_transfer(usd(from, to, cents)).await.unwrap();
        svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    }

    // 50.00 + 25.50 - 10.00
    assert_eq!(
        svc.get_account_balance("acc-m").await.unwrap(),
        Decimal::new(6550, 2)
    );
    assert_eq!(
        svc.get_account_balance("acc-z").await.unwrap(),
        Decimal::new(1000, 2)
    );
    assert_eq!(
        svc.get_account_balance("acc-y").await.unwrap(),
        Decimal::new(-2550, 2)
    );
}

#[tokio::test(start_paused = true)]
async fn pending_and_failed_transfers_do_not_count() {
    let (svc, _) = setup();

    let done = svc.create_transfer(usd("acc-p", "acc-q", 700)).await.unwrap();
    svc.update_transfer_status(&done, "COMPLETED").await.unwrap();

    let _pending = svc.create_transfer(usd("acc-p", "acc-q", 10000)).await.unwrap();
    let failed = svc.create_transfer(usd("acc-p", "acc-q", 20000)).await.unwrap();
    svc.update_transfer_status(&failed, "FAILED").await.unwrap();

    assert_eq!(
        svc.get_account_balance("acc-q").await.unwrap(),
        Decimal::new(700, 2)
    );
}

#[tokio::test(start_paused = true)]
async fn account_with_only_pending_activity_is_not_found() {
    let (svc, _) = setup();
    svc.create_transfer(usd("acc-r", "acc-s", 100)).await.unwrap();

    let err = svc.get_account_balance("acc-s").await.unwrap_err();
    assert!(matches!(err, TransferError::AccountNotFound(ref a) if a == "acc-s"));

    let err = svc.get_account_balance("never-seen").await.unwrap_err();
    assert!(matches!(err, TransferError::AccountNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn update_is_idempotent() {
    let (svc, _) = setup();
    let id = svc.create_transfer(usd("acc-i", "acc-j", 4200)).await.unwrap();

    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();

    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Completed
    );
    assert_eq!(
        svc.get_account_balance("acc-j").await.unwrap(),
        Decimal::new(4200, 2)
    );
}

#[tokio::test(start_paused = true)]
async fn transitions_are_not_guarded() {
    let (svc, _) = setup();
    let id = svc.create_transfer(usd("acc-k", "acc-l", 100)).await.unwrap();

    svc.update_transfer_status(&id, "FAILED").await.unwrap();
    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    svc.update_transfer_status(&id, "PENDING").await.unwrap();

    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn update_missing_id_is_not_found() {
    let (svc, _) = setup();
    let err = svc
        .update_transfer_status(&"01J0NOTAREALTRANSFERID0000".into(), "COMPLETED")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn invalid_status_is_rejected_before_the_store() {
    let (svc, store) = setup();
    let id = svc.create_transfer(usd("acc-v", "acc-w", 100)).await.unwrap();

    for bad in ["INVALID", "completed", ""] {
        let err = svc.update_transfer_status(&id, bad).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidStatus(_)), "{:?}", bad);
    }
    assert_eq!(store.update_count(), 0);
    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn store_failure_on_create_launches_no_monitor() {
    let (svc, store) = setup();
    store.set_fail_writes(true);

    let err = svc
        .create_transfer(usd("acc-f", "acc-g", 100))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Storage(_)));
    assert_eq!(svc.monitors().launched(), 0);
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn monitor_stops_once_transfer_resolves() {
    let (svc, store) = setup();
    let id = svc.create_transfer(usd("acc-1", "acc-2", 100)).await.unwrap();

    // First poll at t=0 sees PENDING, next one is due at t=5s
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.find_count(), 1);

    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();

    // Long past the whole backoff schedule
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.find_count(), 2);
    assert_eq!(svc.monitors().live(), 0);
}

#[tokio::test(start_paused = true)]
async fn monitor_gives_up_after_max_attempts() {
    let (svc, store) = setup();
    svc.create_transfer(usd("acc-3", "acc-4", 100)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.find_count(), 5);
    assert_eq!(svc.monitors().live(), 0);
}

#[tokio::test(start_paused = true)]
async fn monitor_report_for_pending_forever() {
    let (svc, store) = setup();
    let id = store.insert(&usd("acc-5", "acc-6", 100)).await.unwrap();

    let report = svc.monitors().spawn(svc.clone(), id.clone()).await.unwrap();

    assert_eq!(report.transfer_id, id);
    assert_eq!(report.outcome, MonitorOutcome::Exhausted);
    assert_eq!(report.polls(), 5);
    assert_eq!(report.count(AttemptResult::StillPending), 4);
    assert_eq!(report.count(AttemptResult::MaxAttemptsReached), 1);
}

#[tokio::test(start_paused = true)]
async fn monitor_report_for_unknown_transfer() {
    let (svc, _) = setup();
    let report = svc
        .monitors()
        .spawn(svc.clone(), "does-not-exist".into())
        .await
        .unwrap();

    assert_eq!(report.outcome, MonitorOutcome::Errored);
    assert_eq!(report.count(AttemptResult::Error), 1);
    assert_eq!(report.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn balance_overflow_is_a_storage_error_and_ledger_keeps_working() {
    let (svc, store) = setup();

    // Written straight to the store: the engine would refuse these amounts
    for _ in 0..2 {
        let id = store
            .insert(&NewTransfer::new("acc-big", "acc-huge", Decimal::MAX, "USD"))
            .await
            .unwrap();
        store
            .update_status(&id, TransferStatus::Completed)
            .await
            .unwrap();
    }

    let handle = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.get_account_balance("acc-huge").await })
    };
    let err = handle.await.expect("balance task must not panic").unwrap_err();
    assert!(matches!(err, TransferError::Storage(_)));

    let id = svc.create_transfer(usd("acc-7", "acc-8", 100)).await.unwrap();
    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    assert_eq!(
        svc.get_account_balance("acc-8").await.unwrap(),
        Decimal::new(100, 2)
    );
}

#[tokio::test(start_paused = true)]
async fn storage_failure_on_update_propagates() {
    let (svc, store) = setup();
    let id = svc.create_transfer(usd("acc-u", "acc-t", 100)).await.unwrap();
    store.set_fail_writes(true);

    let err = svc
        .update_transfer_status(&id, "COMPLETED")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Storage(_)));
    assert!(!err.is_not_found());

    store.set_fail_writes(false);
    assert_eq!(
        svc.get_transfer(&id).await.unwrap().status,
        TransferStatus::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn storage_failure_on_balance_is_not_account_not_found() {
    let (svc, store) = setup();
    let id = svc.create_transfer(usd("acc-r1", "acc-r2", 100)).await.unwrap();
    svc.update_transfer_status(&id, "COMPLETED").await.unwrap();
    store.set_fail_reads(true);

    for account in ["acc-r2", "never-seen"] {
        let err = svc.get_account_balance(account).await.unwrap_err();
        assert!(matches!(err, TransferError::Storage(_)), "{}", account);
    }

    let err = svc.get_transfer(&id).await.unwrap_err();
    assert!(matches!(err, TransferError::Storage(_)));
}
