use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{Cents, CustomerId, LedgerTransaction, TransactionId, TransactionKind};

use super::AppError;
use super::ledger::LedgerStore;

/// Records wallet top-ups.
///
/// A recharge is first written as pending. With `auto_confirm` set it is
/// confirmed straight away; otherwise it waits for `confirm`.
#[derive(Clone)]
pub struct RechargeProcessor {
    ledger: LedgerStore,
    auto_confirm: bool,
}

impl RechargeProcessor {
    pub fn new(ledger: LedgerStore, auto_confirm: bool) -> Self {
        Self {
            ledger,
            auto_confirm,
        }
    }

    pub fn auto_confirm(&self) -> bool {
        self.auto_confirm
    }

    /// Record a recharge of `amount` cents. Returns the transaction as it
    /// stands afterwards: confirmed when auto-confirm is on, pending otherwise.
    ///
    /// If confirming fails, the pending transaction stays in the ledger and
    /// shows up in `list_pending` for a later `confirm`.
    pub async fn recharge(
        &self,
        customer_id: CustomerId,
        amount: Cents,
        reference: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<LedgerTransaction, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "recharge amount must be positive, got {}",
                amount
            )));
        }

        let pending = self
            .ledger
            .record_pending(customer_id, TransactionKind::Recharge, amount, reference, occurred_at)
            .await?;
        if !self.auto_confirm {
            return Ok(pending);
        }

        self.ledger.confirm(pending.id).await.inspect_err(|err| {
            warn!(
                customer_id = %customer_id,
                transaction_id = %pending.id,
                error = %err,
                "recharge left pending, confirmation failed"
            );
        })
    }

    /// Acknowledge a pending recharge and credit the wallet.
    pub async fn confirm(&self, id: TransactionId) -> Result<LedgerTransaction, AppError> {
        self.ledger.confirm(id).await
    }
}
