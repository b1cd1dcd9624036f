use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    Cents, ConsumptionEntry, ConsumptionId, ConsumptionRecord, ConsumptionUpdate, CustomerId,
    LedgerTransaction, PricingPolicy, TransactionKind, statement_order,
};
use crate::storage::{Repository, accounts, consumption};

use super::AppError;
use super::ledger::post_in;

/// Result of a consumption write: the record as stored (or as it was, for a
/// deletion), the ledger transaction written with it, and the balance after
/// the unit of work committed.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub record: ConsumptionRecord,
    /// `None` when the write did not move the balance
    pub transaction: Option<LedgerTransaction>,
    pub balance: Cents,
}

/// A record on the daily sheet with its owner's name.
#[derive(Debug, Clone, Serialize)]
pub struct DailyEntry {
    pub customer_name: String,
    pub record: ConsumptionRecord,
}

/// Creates, updates and deletes consumption records, keeping the owner's
/// balance and ledger in lockstep with each change.
#[derive(Clone)]
pub struct ConsumptionRecorder {
    repo: Repository,
    pricing: PricingPolicy,
}

impl ConsumptionRecorder {
    pub fn new(repo: Repository, pricing: PricingPolicy) -> Self {
        Self { repo, pricing }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Cost the entry, store it and charge the customer, all or nothing.
    pub async fn create(
        &self,
        entry: ConsumptionEntry,
        at: DateTime<Utc>,
    ) -> Result<RecordOutcome, AppError> {
        let cost = self.pricing.cost_of(&entry.selection)?;
        let customer_id = entry.customer_id;

        let mut tx = self.repo.begin().await?;
        let balance = accounts::lock_for_update(&mut tx, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))?;

        let record = ConsumptionRecord::new(entry, cost, at);
        consumption::insert(&mut tx, &record).await?;

        // A zero-cost record leaves the balance alone, so it gets no ledger row.
        let transaction = match cost {
            0 => None,
            _ => Some(
                post_in(
                    &mut tx,
                    LedgerTransaction::new(customer_id, TransactionKind::DeliveryCharge, cost, at)
                        .with_consumption(Some(record.id)),
                )
                .await?,
            ),
        };
        tx.commit().await?;

        let outcome = outcome(record, transaction, balance);
        info!(
            customer_id = %customer_id,
            record_id = %outcome.record.id,
            cost,
            balance = outcome.balance,
            "consumption recorded"
        );
        Ok(outcome)
    }

    /// Replace the slot and selection of a record, recompute its cost and
    /// charge or refund the difference. An update that leaves the cost
    /// unchanged writes no ledger transaction.
    pub async fn update(
        &self,
        id: ConsumptionId,
        update: ConsumptionUpdate,
        at: DateTime<Utc>,
    ) -> Result<RecordOutcome, AppError> {
        let new_cost = self.pricing.cost_of(&update.selection)?;

        let mut tx = self.repo.begin().await?;
        let mut record = consumption::lock_for_update(&mut tx, id)
            .await?
            .ok_or(AppError::RecordNotFound(id))?;
        let customer_id = record.customer_id;

        let cost_diff = record.apply_update(update, new_cost);
        consumption::update(&mut tx, &record).await?;

        let transaction = match TransactionKind::for_cost_diff(cost_diff) {
            Some((kind, magnitude)) => Some(
                post_in(
                    &mut tx,
                    LedgerTransaction::new(customer_id, kind, magnitude, at)
                        .with_consumption(Some(record.id)),
                )
                .await?,
            ),
            None => None,
        };
        let balance = current_balance(&mut tx, customer_id).await?;
        tx.commit().await?;

        if transaction.is_none() {
            debug!(record_id = %id, "consumption updated without cost change");
        } else {
            info!(
                customer_id = %customer_id,
                record_id = %id,
                cost_diff,
                balance,
                "consumption updated"
            );
        }
        Ok(outcome(record, transaction, balance))
    }

    /// Delete a record and refund exactly its recorded cost.
    pub async fn delete(&self, id: ConsumptionId, at: DateTime<Utc>) -> Result<RecordOutcome, AppError> {
        let mut tx = self.repo.begin().await?;
        let record = consumption::delete(&mut tx, id)
            .await?
            .ok_or(AppError::RecordNotFound(id))?;
        let customer_id = record.customer_id;

        let transaction = match record.total_cost {
            0 => None,
            cost => Some(
                post_in(
                    &mut tx,
                    LedgerTransaction::new(customer_id, TransactionKind::Refund, cost, at)
                        .with_consumption(Some(record.id)),
                )
                .await?,
            ),
        };
        let balance = current_balance(&mut tx, customer_id).await?;
        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            record_id = %id,
            refunded = record.total_cost,
            balance,
            "consumption deleted"
        );
        Ok(outcome(record, transaction, balance))
    }

    pub async fn get(&self, id: ConsumptionId) -> Result<ConsumptionRecord, AppError> {
        let mut conn = self.repo.acquire().await?;
        consumption::find(&mut conn, id)
            .await?
            .ok_or(AppError::RecordNotFound(id))
    }

    /// The day's sheet: customers by name, later slots first.
    pub async fn list_for_date(
        &self,
        date: NaiveDate,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<DailyEntry>, AppError> {
        let mut conn = self.repo.acquire().await?;
        let mut entries: Vec<DailyEntry> = consumption::list_for_date(&mut conn, date, customer_id)
            .await?
            .into_iter()
            .map(|(customer_name, record)| DailyEntry {
                customer_name,
                record,
            })
            .collect();

        entries.sort_by(|a, b| {
            a.customer_name
                .cmp(&b.customer_name)
                .then_with(|| statement_order(&a.record, &b.record))
        });
        Ok(entries)
    }

    pub async fn count_for_customer(&self, customer_id: CustomerId) -> Result<i64, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(consumption::count_for_customer(&mut conn, customer_id).await?)
    }
}

async fn current_balance(
    conn: &mut sqlx::SqliteConnection,
    customer_id: CustomerId,
) -> Result<Cents, AppError> {
    accounts::lock_for_update(conn, customer_id)
        .await?
        .ok_or(AppError::AccountNotFound(customer_id))
}

fn outcome(
    record: ConsumptionRecord,
    transaction: Option<LedgerTransaction>,
    fallback_balance: Cents,
) -> RecordOutcome {
    let balance = transaction
        .as_ref()
        .and_then(|t| t.balance_after)
        .unwrap_or(fallback_balance);
    RecordOutcome {
        record,
        transaction,
        balance,
    }
}
