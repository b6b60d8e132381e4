//! Transfer Core Types

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use super::state::TransferStatus;

/// Fractional digits kept by the ledger column (`NUMERIC(30, 8)`)
pub const AMOUNT_MAX_SCALE: u32 = 8;

/// Integer digits kept by the ledger column (`NUMERIC(30, 8)`)
pub const AMOUNT_MAX_INTEGER_DIGITS: u32 = 22;

/// External transfer identifier
///
/// Generated once by the ledger store at insert time (ULID text, so ids
/// sort by creation time). Lookups accept any string: an id that was never
/// issued is simply not found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransferId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Fields supplied by the caller when creating a transfer
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    /// Carried and persisted; never used in balance arithmetic
    pub currency: String,
}

impl NewTransfer {
    pub fn new(
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            from_account: from_account.into(),
            to_account: to_account.into(),
            amount,
            currency: currency.into(),
        }
    }

    /// Reject amounts the ledger column cannot hold exactly
    ///
    /// Non-negative, at most [`AMOUNT_MAX_SCALE`] significant fractional
    /// digits and at most [`AMOUNT_MAX_INTEGER_DIGITS`] integer digits.
    /// Trailing fractional zeros do not count against the scale.
    pub fn validate_amount(&self) -> Result<(), TransferError> {
        let amount = self.amount;
        if amount < Decimal::ZERO {
            return Err(TransferError::InvalidAmount(format!(
                "{} is negative",
                amount
            )));
        }
        if amount.normalize().scale() > AMOUNT_MAX_SCALE {
            return Err(TransferError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                amount, AMOUNT_MAX_SCALE
            )));
        }
        if amount.trunc() >= amount_integer_ceiling() {
            return Err(TransferError::InvalidAmount(format!(
                "{} has more than {} integer digits",
                amount, AMOUNT_MAX_INTEGER_DIGITS
            )));
        }
        Ok(())
    }
}

/// 10^22, the first integer the ledger column cannot store
fn amount_integer_ceiling() -> Decimal {
    Decimal::from_i128_with_scale(10_i128.pow(AMOUNT_MAX_INTEGER_DIGITS), 0)
}

/// Persisted transfer record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    #[serde(rename = "transfer_id")]
    pub id: TransferId,
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
