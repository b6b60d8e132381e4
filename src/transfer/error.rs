//! Transfer Error Types

use thiserror::Error;

/// Transfer error types
///
/// One typed error per failure kind; callers never see a fallback value.
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    // === Lookup Errors ===
    #[error("Transfer not found: {0}")]
    NotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // === Validation Errors ===
    #[error("'{0}' is not a valid transfer status")]
    InvalidStatus(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === System Errors ===
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::NotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InvalidStatus(_) => "INVALID_STATUS",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidStatus(_) | TransferError::InvalidAmount(_) => 400,
            TransferError::NotFound(_) | TransferError::AccountNotFound(_) => 404,
            TransferError::Storage(_) => 500,
        }
    }

    /// Lookup miss on a transfer id or an account
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransferError::NotFound(_) | TransferError::AccountNotFound(_)
        )
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Storage(e.to_string())
    }
}
