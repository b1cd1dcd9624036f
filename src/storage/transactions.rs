use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Cents, CustomerId, LedgerTransaction, TransactionId, TransactionKind, TransactionStatus,
};

use super::{decode_timestamp, decode_uuid, encode_timestamp};

const TRANSACTION_COLUMNS: &str = "id, sequence, customer_id, kind, status, amount, reference, \
     consumption_id, balance_after, created_at";

/// Save a new transaction. Assigns the next sequence number.
pub async fn insert(conn: &mut SqliteConnection, transaction: &mut LedgerTransaction) -> Result<()> {
    transaction.sequence = next_sequence(conn).await?;

    sqlx::query(
        r#"
        INSERT INTO ledger_transactions (id, sequence, customer_id, kind, status, amount, reference, consumption_id, balance_after, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(transaction.id.to_string())
    .bind(transaction.sequence)
    .bind(transaction.customer_id.to_string())
    .bind(transaction.kind.as_str())
    .bind(transaction.status.as_str())
    .bind(transaction.amount)
    .bind(&transaction.reference)
    .bind(transaction.consumption_id.map(|id| id.to_string()))
    .bind(transaction.balance_after)
    .bind(encode_timestamp(transaction.created_at))
    .execute(&mut *conn)
    .await
    .context("Failed to save ledger transaction")?;

    Ok(())
}

/// Get the next sequence number and increment the counter.
async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
    let row = sqlx::query(
        r#"
        UPDATE sequence_counter
        SET value = value + 1
        WHERE name = 'ledger_sequence'
        RETURNING value
        "#,
    )
    .fetch_one(&mut *conn)
    .await
    .context("Failed to get next sequence number")?;

    Ok(row.get("value"))
}

/// Move a pending transaction to confirmed and return the updated row.
/// Returns `None` when no pending transaction has this id, so two racing
/// confirmations cannot both succeed.
pub async fn claim_pending(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<Option<LedgerTransaction>> {
    let row = sqlx::query(&format!(
        "UPDATE ledger_transactions SET status = ? WHERE id = ? AND status = ? RETURNING {}",
        TRANSACTION_COLUMNS
    ))
    .bind(TransactionStatus::Confirmed.as_str())
    .bind(id.to_string())
    .bind(TransactionStatus::PendingAcknowledgement.as_str())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to confirm transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

/// Record the balance snapshot of a transaction that was just applied.
pub async fn set_balance_after(
    conn: &mut SqliteConnection,
    id: TransactionId,
    balance_after: Cents,
) -> Result<()> {
    sqlx::query("UPDATE ledger_transactions SET balance_after = ? WHERE id = ?")
        .bind(balance_after)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to record balance snapshot")?;
    Ok(())
}

/// Get a transaction by ID.
pub async fn find(conn: &mut SqliteConnection, id: TransactionId) -> Result<Option<LedgerTransaction>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM ledger_transactions WHERE id = ?",
        TRANSACTION_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch ledger transaction")?;

    row.as_ref().map(row_to_transaction).transpose()
}

/// All transactions of a customer, in write order.
pub async fn list_for_customer(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<Vec<LedgerTransaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM ledger_transactions WHERE customer_id = ? ORDER BY sequence",
        TRANSACTION_COLUMNS
    ))
    .bind(customer_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list ledger transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Transactions still awaiting acknowledgement, optionally for one customer.
pub async fn list_pending(
    conn: &mut SqliteConnection,
    customer_id: Option<CustomerId>,
) -> Result<Vec<LedgerTransaction>> {
    let mut query = format!(
        "SELECT {} FROM ledger_transactions WHERE status = ?",
        TRANSACTION_COLUMNS
    );
    if customer_id.is_some() {
        query.push_str(" AND customer_id = ?");
    }
    query.push_str(" ORDER BY sequence");

    let customer_str = customer_id.map(|id| id.to_string());
    let mut sql_query =
        sqlx::query(&query).bind(TransactionStatus::PendingAcknowledgement.as_str());
    if let Some(ref cid) = customer_str {
        sql_query = sql_query.bind(cid);
    }

    let rows = sql_query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list pending transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Confirmed transactions created in `[from, to)`, in write order.
pub async fn list_confirmed_between(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<LedgerTransaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM ledger_transactions \
         WHERE customer_id = ? AND status = ? AND created_at >= ? AND created_at < ? \
         ORDER BY created_at, sequence",
        TRANSACTION_COLUMNS
    ))
    .bind(customer_id.to_string())
    .bind(TransactionStatus::Confirmed.as_str())
    .bind(encode_timestamp(from))
    .bind(encode_timestamp(to))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list confirmed transactions")?;

    rows.iter().map(row_to_transaction).collect()
}

/// Balance snapshot of the latest confirmed transaction created strictly
/// before `cutoff`. Ties on `created_at` go to the later write.
pub async fn balance_as_of(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    cutoff: DateTime<Utc>,
) -> Result<Option<Cents>> {
    let row = sqlx::query(
        r#"
        SELECT balance_after
        FROM ledger_transactions
        WHERE customer_id = ? AND status = ? AND created_at < ?
        ORDER BY created_at DESC, sequence DESC
        LIMIT 1
        "#,
    )
    .bind(customer_id.to_string())
    .bind(TransactionStatus::Confirmed.as_str())
    .bind(encode_timestamp(cutoff))
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to read balance snapshot")?;

    Ok(row.and_then(|r| r.get::<Option<Cents>, _>("balance_after")))
}

/// Ledger-wide counters for integrity checking.
#[derive(Debug, Clone, Copy)]
pub struct LedgerStats {
    pub transaction_count: i64,
    pub missing_snapshots: i64,
    pub invalid_amounts: i64,
}

pub async fn stats(conn: &mut SqliteConnection) -> Result<LedgerStats> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS transaction_count,
            COALESCE(SUM(CASE WHEN status = ? AND balance_after IS NULL THEN 1 ELSE 0 END), 0) AS missing_snapshots,
            COALESCE(SUM(CASE WHEN amount <= 0 THEN 1 ELSE 0 END), 0) AS invalid_amounts
        FROM ledger_transactions
        "#,
    )
    .bind(TransactionStatus::Confirmed.as_str())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to gather ledger statistics")?;

    Ok(LedgerStats {
        transaction_count: row.get("transaction_count"),
        missing_snapshots: row.get("missing_snapshots"),
        invalid_amounts: row.get("invalid_amounts"),
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<LedgerTransaction> {
    let id_str: String = row.get("id");
    let customer_str: String = row.get("customer_id");
    let kind_str: String = row.get("kind");
    let status_str: String = row.get("status");
    let consumption_str: Option<String> = row.get("consumption_id");
    let created_at_str: String = row.get("created_at");

    Ok(LedgerTransaction {
        id: decode_uuid(&id_str).context("Invalid transaction ID")?,
        sequence: row.get("sequence"),
        customer_id: decode_uuid(&customer_str).context("Invalid customer ID")?,
        kind: TransactionKind::from_str(&kind_str)
            .ok_or_else(|| anyhow!("Invalid transaction kind: {}", kind_str))?,
        status: TransactionStatus::from_str(&status_str)
            .ok_or_else(|| anyhow!("Invalid transaction status: {}", status_str))?,
        amount: row.get("amount"),
        reference: row.get("reference"),
        consumption_id: consumption_str
            .map(|s| decode_uuid(&s))
            .transpose()
            .context("Invalid consumption ID")?,
        balance_after: row.get("balance_after"),
        created_at: decode_timestamp(&created_at_str)?,
    })
}
