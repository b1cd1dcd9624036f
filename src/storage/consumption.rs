use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{ConsumptionId, ConsumptionRecord, CustomerId, MealSelection, MealSlot};

use super::{decode_date, decode_timestamp, decode_uuid, encode_date, encode_timestamp};

const RECORD_COLUMNS: &str = "id, customer_id, service_date, meal_slot, has_main_meal, is_premium, \
     dish_name, extra_rice, extra_bread, total_cost, recorded_at";

/// Save a new consumption record.
pub async fn insert(conn: &mut SqliteConnection, record: &ConsumptionRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO consumption_records (id, customer_id, service_date, meal_slot, has_main_meal, is_premium, dish_name, extra_rice, extra_bread, total_cost, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.customer_id.to_string())
    .bind(encode_date(record.service_date))
    .bind(record.meal_slot.as_str())
    .bind(record.selection.has_main_meal)
    .bind(record.selection.is_premium)
    .bind(&record.selection.dish_name)
    .bind(i64::from(record.selection.extra_rice))
    .bind(i64::from(record.selection.extra_bread))
    .bind(record.total_cost)
    .bind(encode_timestamp(record.recorded_at))
    .execute(&mut *conn)
    .await
    .context("Failed to save consumption record")?;
    Ok(())
}

/// Overwrite the mutable fields of a record (slot, selection, cost).
pub async fn update(conn: &mut SqliteConnection, record: &ConsumptionRecord) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE consumption_records
        SET meal_slot = ?, has_main_meal = ?, is_premium = ?, dish_name = ?, extra_rice = ?, extra_bread = ?, total_cost = ?
        WHERE id = ?
        "#,
    )
    .bind(record.meal_slot.as_str())
    .bind(record.selection.has_main_meal)
    .bind(record.selection.is_premium)
    .bind(&record.selection.dish_name)
    .bind(i64::from(record.selection.extra_rice))
    .bind(i64::from(record.selection.extra_bread))
    .bind(record.total_cost)
    .bind(record.id.to_string())
    .execute(&mut *conn)
    .await
    .context("Failed to update consumption record")?;

    if result.rows_affected() != 1 {
        return Err(anyhow!("Consumption record {} vanished during update", record.id));
    }
    Ok(())
}

/// Delete a record and return it as it was, or `None` if it does not exist.
pub async fn delete(
    conn: &mut SqliteConnection,
    id: ConsumptionId,
) -> Result<Option<ConsumptionRecord>> {
    let row = sqlx::query(&format!(
        "DELETE FROM consumption_records WHERE id = ? RETURNING {}",
        RECORD_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to delete consumption record")?;

    row.as_ref().map(row_to_record).transpose()
}

/// Read a record while taking the write lock (see `accounts::lock_for_update`).
pub async fn lock_for_update(
    conn: &mut SqliteConnection,
    id: ConsumptionId,
) -> Result<Option<ConsumptionRecord>> {
    let row = sqlx::query(&format!(
        "UPDATE consumption_records SET total_cost = total_cost WHERE id = ? RETURNING {}",
        RECORD_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to lock consumption record")?;

    row.as_ref().map(row_to_record).transpose()
}

/// Get a record by ID.
pub async fn find(conn: &mut SqliteConnection, id: ConsumptionId) -> Result<Option<ConsumptionRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM consumption_records WHERE id = ?",
        RECORD_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .context("Failed to fetch consumption record")?;

    row.as_ref().map(row_to_record).transpose()
}

/// Records of one customer with a service date in `[start, end]`, by date.
pub async fn list_for_customer_in_range(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ConsumptionRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM consumption_records \
         WHERE customer_id = ? AND service_date >= ? AND service_date <= ? \
         ORDER BY service_date, recorded_at",
        RECORD_COLUMNS
    ))
    .bind(customer_id.to_string())
    .bind(encode_date(start))
    .bind(encode_date(end))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list consumption records")?;

    rows.iter().map(row_to_record).collect()
}

/// Records served on one date, optionally for a single customer, with the
/// owner's name for display.
pub async fn list_for_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    customer_id: Option<CustomerId>,
) -> Result<Vec<(String, ConsumptionRecord)>> {
    let mut query = String::from(
        "SELECT r.id, r.customer_id, r.service_date, r.meal_slot, r.has_main_meal, r.is_premium, \
         r.dish_name, r.extra_rice, r.extra_bread, r.total_cost, r.recorded_at, a.name AS customer_name \
         FROM consumption_records r JOIN accounts a ON a.id = r.customer_id \
         WHERE r.service_date = ?",
    );
    if customer_id.is_some() {
        query.push_str(" AND r.customer_id = ?");
    }
    query.push_str(" ORDER BY a.name, r.recorded_at");

    let customer_str = customer_id.map(|id| id.to_string());
    let mut sql_query = sqlx::query(&query).bind(encode_date(date));
    if let Some(ref cid) = customer_str {
        sql_query = sql_query.bind(cid);
    }

    let rows = sql_query
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list consumption for date")?;

    rows.iter()
        .map(|row| -> Result<(String, ConsumptionRecord)> {
            Ok((row.get("customer_name"), row_to_record(row)?))
        })
        .collect()
}

/// Number of records owned by a customer.
pub async fn count_for_customer(conn: &mut SqliteConnection, customer_id: CustomerId) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM consumption_records WHERE customer_id = ?")
        .bind(customer_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count consumption records")?;
    Ok(row.get("count"))
}

fn row_to_record(row: &SqliteRow) -> Result<ConsumptionRecord> {
    let id_str: String = row.get("id");
    let customer_str: String = row.get("customer_id");
    let date_str: String = row.get("service_date");
    let slot_str: String = row.get("meal_slot");
    let recorded_at_str: String = row.get("recorded_at");
    let extra_rice: i64 = row.get("extra_rice");
    let extra_bread: i64 = row.get("extra_bread");

    Ok(ConsumptionRecord {
        id: decode_uuid(&id_str).context("Invalid consumption ID")?,
        customer_id: decode_uuid(&customer_str).context("Invalid customer ID")?,
        service_date: decode_date(&date_str)?,
        meal_slot: MealSlot::from_str(&slot_str)
            .ok_or_else(|| anyhow!("Invalid meal slot: {}", slot_str))?,
        selection: MealSelection {
            has_main_meal: row.get("has_main_meal"),
            is_premium: row.get("is_premium"),
            dish_name: row.get("dish_name"),
            extra_rice: u32::try_from(extra_rice).context("Invalid extra rice count")?,
            extra_bread: u32::try_from(extra_bread).context("Invalid extra bread count")?,
        },
        total_cost: row.get("total_cost"),
        recorded_at: decode_timestamp(&recorded_at_str)?,
    })
}
