use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{Account, Cents, CustomerId};

use super::{decode_timestamp, decode_uuid, encode_timestamp};

const ACCOUNT_COLUMNS: &str =
    "id, name, mobile_no, building_no, room_no, plan, balance, created_at";

/// Save a new account.
pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, name, mobile_no, building_no, room_no, plan, balance, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id.to_string())
    .bind(&account.name)
    .bind(&account.mobile_no)
    .bind(&account.building_no)
    .bind(&account.room_no)
    .bind(&account.plan)
    .bind(account.balance)
    .bind(encode_timestamp(account.created_at))
    .execute(&mut *conn)
    .await
    .context("Failed to save account")?;
    Ok(())
}

/// Get an account by ID.
pub async fn find(conn: &mut SqliteConnection, id: CustomerId) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch account")?;

    row.as_ref().map(row_to_account).transpose()
}

/// List all accounts ordered by name.
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts ORDER BY name, created_at",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list accounts")?;

    rows.iter().map(row_to_account).collect()
}

/// Take the write lock on an account and return its current balance, or
/// `None` if the account does not exist.
///
/// SQLite has no `SELECT ... FOR UPDATE`; a no-op write makes the enclosing
/// transaction a writer before anything is read, so a concurrent unit of work
/// on the same database waits instead of computing from a stale balance.
pub async fn lock_for_update(conn: &mut SqliteConnection, id: CustomerId) -> Result<Option<Cents>> {
    let row = sqlx::query("UPDATE accounts SET balance = balance WHERE id = ? RETURNING balance")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to lock account")?;

    row.map(|r| r.try_get("balance"))
        .transpose()
        .context("Stored balance is not an integer")
}

/// Overwrite the balance of an account locked with `lock_for_update`.
pub async fn set_balance(conn: &mut SqliteConnection, id: CustomerId, balance: Cents) -> Result<()> {
    sqlx::query("UPDATE accounts SET balance = ? WHERE id = ?")
        .bind(balance)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to update balance")?;
    Ok(())
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        id: decode_uuid(&id_str).context("Invalid account ID")?,
        name: row.get("name"),
        mobile_no: row.get("mobile_no"),
        building_no: row.get("building_no"),
        room_no: row.get("room_no"),
        plan: row.get("plan"),
        balance: row.get("balance"),
        created_at: decode_timestamp(&created_at_str)?,
    })
}
