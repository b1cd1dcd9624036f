use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::domain::{
    AccountIntegrity, Cents, CustomerId, IntegrityReport, LedgerTransaction, TransactionId,
    TransactionKind, ledger_balance,
};
use crate::storage::{Repository, accounts, transactions};

use super::AppError;

/// Append-only ledger of balance-affecting events, plus the cached balance
/// on each account.
///
/// Every public operation is one unit of work. The `*_in` functions are the
/// same primitives run on a caller's open transaction, so that a consumption
/// write and its ledger entry commit or roll back together.
#[derive(Clone)]
pub struct LedgerStore {
    repo: Repository,
}

impl LedgerStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Move the balance by `sign(kind) × magnitude` and write one confirmed
    /// transaction. The returned transaction's `balance_after` is the new
    /// balance.
    pub async fn apply_delta(
        &self,
        customer_id: CustomerId,
        kind: TransactionKind,
        magnitude: Cents,
        reference: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<LedgerTransaction, AppError> {
        let mut tx = self.repo.begin().await?;
        let transaction = post_in(
            &mut tx,
            LedgerTransaction::new(customer_id, kind, magnitude, at).with_reference(reference),
        )
        .await?;
        tx.commit().await?;

        log_posted(&transaction);
        Ok(transaction)
    }

    /// Write a transaction awaiting acknowledgement. The balance is untouched
    /// until `confirm`.
    pub async fn record_pending(
        &self,
        customer_id: CustomerId,
        kind: TransactionKind,
        magnitude: Cents,
        reference: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<LedgerTransaction, AppError> {
        ensure_positive(magnitude)?;

        let mut tx = self.repo.begin().await?;
        accounts::lock_for_update(&mut tx, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))?;

        let mut transaction =
            LedgerTransaction::new(customer_id, kind, magnitude, at).with_reference(reference);
        transactions::insert(&mut tx, &mut transaction).await?;
        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            transaction_id = %transaction.id,
            kind = %kind,
            amount = magnitude,
            "pending transaction recorded"
        );
        Ok(transaction)
    }

    /// Confirm a pending transaction and apply it to the balance.
    ///
    /// Confirming twice fails with `AlreadyConfirmed` and changes nothing.
    pub async fn confirm(&self, id: TransactionId) -> Result<LedgerTransaction, AppError> {
        let mut tx = self.repo.begin().await?;
        let transaction = confirm_in(&mut tx, id).await?;
        tx.commit().await?;

        log_posted(&transaction);
        Ok(transaction)
    }

    /// Balance snapshot of the last confirmed transaction strictly before
    /// `cutoff`; zero when there is no earlier history.
    pub async fn balance_as_of(
        &self,
        customer_id: CustomerId,
        cutoff: DateTime<Utc>,
    ) -> Result<Cents, AppError> {
        let mut conn = self.repo.acquire().await?;
        accounts::find(&mut conn, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))?;
        balance_as_of_in(&mut conn, customer_id, cutoff).await
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<LedgerTransaction, AppError> {
        let mut conn = self.repo.acquire().await?;
        transactions::find(&mut conn, id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// Full history of a customer in the order it was written.
    pub async fn list_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let mut conn = self.repo.acquire().await?;
        accounts::find(&mut conn, customer_id)
            .await?
            .ok_or(AppError::AccountNotFound(customer_id))?;
        Ok(transactions::list_for_customer(&mut conn, customer_id).await?)
    }

    /// Transactions left in `pending_acknowledgement`, for reconciliation.
    pub async fn list_pending(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<LedgerTransaction>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(transactions::list_pending(&mut conn, customer_id).await?)
    }

    /// Compare the cached balance of one account with its ledger.
    pub async fn verify_account(&self, customer_id: CustomerId) -> Result<AccountIntegrity, AppError> {
        let mut tx = self.repo.begin().await?;
        let integrity = verify_in(&mut tx, customer_id).await?;
        tx.rollback().await?;
        Ok(integrity)
    }

    /// Verify every account and the ledger-wide counters in one snapshot.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let mut tx = self.repo.begin().await?;
        let stats = transactions::stats(&mut tx).await?;

        let mut report = IntegrityReport {
            accounts: Vec::new(),
            transaction_count: stats.transaction_count,
            missing_snapshots: stats.missing_snapshots,
            invalid_amounts: stats.invalid_amounts,
        };
        for account in accounts::list(&mut tx).await? {
            report.accounts.push(verify_in(&mut tx, account.id).await?);
        }
        tx.rollback().await?;

        debug!(
            accounts = report.accounts.len(),
            transactions = report.transaction_count,
            ok = report.is_ok(),
            "integrity check finished"
        );
        Ok(report)
    }
}

/// Apply a new transaction to its account and store it as confirmed with the
/// resulting balance snapshot.
pub(crate) async fn post_in(
    conn: &mut SqliteConnection,
    mut transaction: LedgerTransaction,
) -> Result<LedgerTransaction, AppError> {
    ensure_positive(transaction.amount)?;

    let customer_id = transaction.customer_id;
    let new_balance = move_balance(conn, customer_id, transaction.signed_amount()).await?;

    transaction = transaction.confirmed(new_balance);
    transactions::insert(conn, &mut transaction).await?;
    Ok(transaction)
}

pub(crate) async fn confirm_in(
    conn: &mut SqliteConnection,
    id: TransactionId,
) -> Result<LedgerTransaction, AppError> {
    let Some(claimed) = transactions::claim_pending(conn, id).await? else {
        return match transactions::find(conn, id).await? {
            Some(_) => Err(AppError::AlreadyConfirmed(id)),
            None => Err(AppError::TransactionNotFound(id)),
        };
    };

    let new_balance = move_balance(conn, claimed.customer_id, claimed.signed_amount()).await?;
    transactions::set_balance_after(conn, id, new_balance).await?;

    Ok(claimed.confirmed(new_balance))
}

/// Lock the account, add `delta` with an overflow check and write the
/// result back. Returns the new balance.
async fn move_balance(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    delta: Cents,
) -> Result<Cents, AppError> {
    let current = accounts::lock_for_update(conn, customer_id)
        .await?
        .ok_or(AppError::AccountNotFound(customer_id))?;
    let new_balance = current.checked_add(delta).ok_or_else(|| {
        AppError::InvalidAmount(format!(
            "balance {} cannot move by {} without overflowing",
            current, delta
        ))
    })?;

    accounts::set_balance(conn, customer_id, new_balance).await?;
    Ok(new_balance)
}

pub(crate) async fn balance_as_of_in(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
    cutoff: DateTime<Utc>,
) -> Result<Cents, AppError> {
    Ok(transactions::balance_as_of(conn, customer_id, cutoff)
        .await?
        .unwrap_or(0))
}

async fn verify_in(
    conn: &mut SqliteConnection,
    customer_id: CustomerId,
) -> Result<AccountIntegrity, AppError> {
    let account = accounts::find(conn, customer_id)
        .await?
        .ok_or(AppError::AccountNotFound(customer_id))?;
    let history = transactions::list_for_customer(conn, customer_id).await?;

    Ok(AccountIntegrity {
        customer_id,
        name: account.name,
        stored_balance: account.balance,
        ledger_balance: ledger_balance(&history),
        pending_count: history.iter().filter(|t| !t.is_confirmed()).count() as i64,
    })
}

fn ensure_positive(magnitude: Cents) -> Result<(), AppError> {
    if magnitude <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "ledger amounts must be positive, got {}",
            magnitude
        )));
    }
    Ok(())
}

fn log_posted(transaction: &LedgerTransaction) {
    info!(
        customer_id = %transaction.customer_id,
        transaction_id = %transaction.id,
        kind = %transaction.kind,
        amount = transaction.amount,
        balance = transaction.balance_after,
        "ledger transaction confirmed"
    );
}
