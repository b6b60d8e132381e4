//! Transfer Database Layer
//!
//! PostgreSQL-backed [`LedgerStore`]. Balances are never stored; they are
//! aggregated from `transfers_tb` on every request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use super::error::TransferError;
use super::state::TransferStatus;
use super::store::LedgerStore;
use super::types::{NewTransfer, Transfer, TransferId};

const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers_tb (
    id            BIGSERIAL PRIMARY KEY,
    transfer_id   TEXT NOT NULL UNIQUE,
    from_account  TEXT NOT NULL,
    to_account    TEXT NOT NULL,
    amount        NUMERIC(30, 8) NOT NULL CHECK (amount >= 0),
    currency      TEXT NOT NULL DEFAULT '',
    status        TEXT NOT NULL CHECK (status IN ('PENDING', 'COMPLETED', 'FAILED')),
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_INBOUND_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transfers_to_status \
     ON transfers_tb (to_account, status)";

const CREATE_OUTBOUND_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_transfers_from_status \
     ON transfers_tb (from_account, status)";

/// Create `transfers_tb` and its aggregate indexes if missing
pub async fn init_schema(pool: &PgPool) -> Result<(), TransferError> {
    tracing::info!("Initializing ledger schema...");

    for ddl in [
        CREATE_TRANSFERS_TABLE,
        CREATE_INBOUND_INDEX,
        CREATE_OUTBOUND_INDEX,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Ledger schema ready");
    Ok(())
}

/// PostgreSQL ledger store
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new PgLedgerStore with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn sum_completed(
        &self,
        column_query: &str,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError> {
        // SUM() over zero rows is NULL, which is how "no activity" is told
        // apart from a real zero
        let sum = sqlx::query_scalar::<_, Option<Decimal>>(column_query)
            .bind(account)
            .bind(TransferStatus::Completed.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(sum)
    }

    /// Convert database row to Transfer
    fn row_to_transfer(row: &sqlx::postgres::PgRow) -> Result<Transfer, TransferError> {
        let status_str: String = row.try_get("status")?;
        let status = status_str.parse::<TransferStatus>().map_err(|_| {
            TransferError::Storage(format!("Invalid status in ledger: {}", status_str))
        })?;

        let id: String = row.try_get("transfer_id")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Transfer {
            id: TransferId::from(id),
            from_account: row.try_get("from_account")?,
            to_account: row.try_get("to_account")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            status,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, transfer: &NewTransfer) -> Result<TransferId, TransferError> {
        let id = TransferId::generate();

        sqlx::query(
            r#"
            INSERT INTO transfers_tb
                (transfer_id, from_account, to_account, amount, currency, status, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            "#,
        )
        .bind(id.as_str())
        .bind(&transfer.from_account)
        .bind(&transfer.to_account)
        .bind(transfer.amount)
        .bind(&transfer.currency)
        .bind(TransferStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_id(&self, id: &TransferId) -> Result<Transfer, TransferError> {
        let row = sqlx::query(
            r#"
            SELECT transfer_id, from_account, to_account, amount, currency, status,
                   created_at, updated_at
            FROM transfers_tb
            WHERE transfer_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_transfer(&row),
            None => Err(TransferError::NotFound(id.to_string())),
        }
    }

    async fn update_status(
        &self,
        id: &TransferId,
        status: TransferStatus,
    ) -> Result<(), TransferError> {
        // PostgreSQL counts matched rows, so re-applying the current status
        // still reports one row
        let result = sqlx::query(
            r#"
            UPDATE transfers_tb
            SET status = $1, updated_at = NOW()
            WHERE transfer_id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TransferError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn sum_completed_inbound(
        &self,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError> {
        self.sum_completed(
            "SELECT SUM(amount) FROM transfers_tb WHERE to_account = $1 AND status = $2",
            account,
        )
        .await
    }

    async fn sum_completed_outbound(
        &self,
        account: &str,
    ) -> Result<Option<Decimal>, TransferError> {
        self.sum_completed(
            "SELECT SUM(amount) FROM transfers_tb WHERE from_account = $1 AND status = $2",
            account,
        )
        .await
    }

    async fn health_check(&self) -> Result<(), TransferError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
