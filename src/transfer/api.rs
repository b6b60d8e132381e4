//! Transfer API Types
//!
//! Wire shapes accepted and returned by the HTTP gateway. Handlers convert
//! these into engine calls; nothing here touches the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::TransferStatus;
use super::types::{NewTransfer, TransferId};

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /api/v1/transfer`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransferRequest {
    #[serde(alias = "fromAccount")]
    pub source_account_id: String,
    #[serde(alias = "toAccount")]
    pub destination_account_id: String,
    /// JSON number or decimal string
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
}

impl From<CreateTransferRequest> for NewTransfer {
    fn from(req: CreateTransferRequest) -> Self {
        NewTransfer::new(
            req.source_account_id,
            req.destination_account_id,
            req.amount,
            req.currency,
        )
    }
}

/// Settlement notification from the payment provider
///
/// `status` stays a raw string here; the engine validates it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(alias = "id")]
    pub transfer_id: String,
    pub status: String,
}

// ============================================================================
// Responses
// ============================================================================

/// Returned by a successful create
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransferResponse {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
}

impl CreateTransferResponse {
    pub fn pending(transfer_id: TransferId) -> Self {
        Self {
            transfer_id,
            status: TransferStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

impl WebhookAck {
    pub const UPDATED: WebhookAck = WebhookAck {
        status: "Transfer updated",
    };
}
