//! Payment Transfer Ledger
//!
//! Records directed transfers between accounts, drives them through their
//! lifecycle from settlement webhooks, and derives balances on demand from
//! completed transfers.
//!
//! # State Machine
//!
//! ```text
//! PENDING ──webhook──→ COMPLETED
//!    │                     ↕
//!    └─────webhook────→ FAILED
//! ```
//!
//! Transitions are not guarded: any valid status may be applied from any
//! state, and re-applying the current status succeeds.
//!
//! # Invariants
//!
//! 1. **Pending on create**: a new record is always `PENDING`
//! 2. **Derived balances**: balance = completed inbound − completed outbound,
//!    never stored
//! 3. **Validated status**: a status string outside the closed set never
//!    reaches the store
//! 4. **One monitor per create**: launched only after persistence succeeds

pub mod api;
pub mod balance;
pub mod db;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use balance::BalanceCalculator;
pub use db::PgLedgerStore;
pub use error::TransferError;
pub use memory::MemoryLedgerStore;
pub use monitor::{
    AttemptRecord, AttemptResult, MonitorOutcome, MonitorPolicy, MonitorReport, MonitorSpawner,
    TransferLookup, TransferMonitor,
};
pub use service::TransferService;
pub use state::TransferStatus;
pub use store::LedgerStore;
pub use types::{NewTransfer, Transfer, TransferId};
