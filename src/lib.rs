//! Transfer Ledger - Payment Transfer Service
//!
//! Records transfers between accounts, settles them from provider
//! webhooks and derives balances from completed transfers.
//!
//! # Modules
//!
//! - [`transfer`] - Ledger store, balance calculator, lifecycle engine, monitor
//! - [`gateway`] - axum HTTP API (bearer auth, webhook, health, metrics)
//! - [`db`] - PostgreSQL connection pool
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup
//! - [`metrics`] - Operation and monitor metrics

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigError};
pub use transfer::{
    LedgerStore, MemoryLedgerStore, MonitorPolicy, MonitorSpawner, NewTransfer, PgLedgerStore,
    Transfer, TransferError, TransferId, TransferService, TransferStatus,
};
