//! Transfer Status Definitions
//!
//! The closed status set stored in `transfers_tb.status` as TEXT.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::TransferError;

/// Transfer lifecycle status
///
/// Created as `Pending`; moved to `Completed` or `Failed` by an explicit
/// status update (usually the settlement webhook). No transition is
/// guarded: any status may be applied to any transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Awaiting settlement
    Pending,
    /// Settled; counts towards balances
    Completed,
    /// Rejected by the processor; never counts towards balances
    Failed,
}

impl TransferStatus {
    /// All members of the closed set
    pub const ALL: [TransferStatus; 3] = [
        TransferStatus::Pending,
        TransferStatus::Completed,
        TransferStatus::Failed,
    ];

    /// Still waiting for a settlement outcome
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, TransferStatus::Pending)
    }

    /// Get the storage / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = TransferError;

    /// Exact, case-sensitive match against the closed set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransferStatus::Pending),
            "COMPLETED" => Ok(TransferStatus::Completed),
            "FAILED" => Ok(TransferStatus::Failed),
            other => Err(TransferError::InvalidStatus(other.to_string())),
        }
    }
}
