use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::domain::{
    CustomerId, DateRange, Statement, TransactionKind, statement_order, total_spent,
};
use crate::storage::{Repository, accounts, consumption, transactions};

use super::AppError;
use super::ledger::balance_as_of_in;

/// Builds billing statements. Every figure is read from one snapshot of the
/// database, so a concurrent write cannot tear a statement.
#[derive(Clone)]
pub struct StatementBuilder {
    repo: Repository,
}

impl StatementBuilder {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Statement for `[start, end]`, both dates inclusive.
    ///
    /// The opening balance is always the last confirmed snapshot before
    /// `start` 00:00 UTC. The closing balance is the balance right now.
    pub async fn build(
        &self,
        customer_id: CustomerId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Statement, AppError> {
        let range = DateRange::new(start, end).ok_or(AppError::InvalidDateRange { start, end })?;

        let mut tx = self.repo.begin().await?;
        let account = accounts::find(&mut tx, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))?;

        let mut records =
            consumption::list_for_customer_in_range(&mut tx, customer_id, range.start, range.end)
                .await?;
        records.sort_by(statement_order);

        let in_range = transactions::list_confirmed_between(
            &mut tx,
            customer_id,
            range.opens_at(),
            range.closes_at(),
        )
        .await?;
        let total_recharges = in_range
            .iter()
            .filter(|t| t.kind == TransactionKind::Recharge)
            .map(|t| t.amount)
            .sum();

        let opening_balance = balance_as_of_in(&mut tx, customer_id, range.opens_at()).await?;
        tx.rollback().await?;

        let statement = Statement {
            total_spent: total_spent(&records),
            total_recharges,
            opening_balance,
            closing_balance: account.balance,
            account,
            range,
            records,
            transactions: in_range,
            generated_at: Utc::now(),
        };

        debug!(
            customer_id = %customer_id,
            start = %range.start,
            end = %range.end,
            records = statement.records.len(),
            opening = statement.opening_balance,
            closing = statement.closing_balance,
            "statement built"
        );
        Ok(statement)
    }
}
