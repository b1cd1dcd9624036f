use serde::{Deserialize, Serialize};

use super::{Cents, CustomerId, LedgerTransaction};

/// Balance implied by a transaction history: the signed sum of confirmed
/// transactions. Pending ones do not count.
pub fn ledger_balance(transactions: &[LedgerTransaction]) -> Cents {
    transactions
        .iter()
        .filter(|t| t.is_confirmed())
        .map(LedgerTransaction::signed_amount)
        .sum()
}

/// Stored balance of one account checked against its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIntegrity {
    pub customer_id: CustomerId,
    pub name: String,
    pub stored_balance: Cents,
    pub ledger_balance: Cents,
    pub pending_count: i64,
}

impl AccountIntegrity {
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.ledger_balance
    }

    pub fn drift(&self) -> Cents {
        self.stored_balance - self.ledger_balance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub accounts: Vec<AccountIntegrity>,
    pub transaction_count: i64,
    /// Confirmed transactions without a balance snapshot
    pub missing_snapshots: i64,
    /// Transactions with a zero or negative amount
    pub invalid_amounts: i64,
}

impl IntegrityReport {
    pub fn drifted(&self) -> impl Iterator<Item = &AccountIntegrity> {
        self.accounts.iter().filter(|a| !a.is_consistent())
    }

    pub fn pending_count(&self) -> i64 {
        self.accounts.iter().map(|a| a.pending_count).sum()
    }

    pub fn is_ok(&self) -> bool {
        self.drifted().next().is_none() && self.missing_snapshots == 0 && self.invalid_amounts == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::TransactionKind;

    fn confirmed(customer: CustomerId, kind: TransactionKind, amount: Cents) -> LedgerTransaction {
        LedgerTransaction::new(customer, kind, amount, Utc::now()).confirmed(0)
    }

    #[test]
    fn test_ledger_balance_empty() {
        assert_eq!(ledger_balance(&[]), 0);
    }

    #[test]
    fn test_ledger_balance_mixed_kinds() {
        let customer = Uuid::new_v4();
        let transactions = vec![
            confirmed(customer, TransactionKind::Recharge, 50000),
            confirmed(customer, TransactionKind::DeliveryCharge, 7650),
            confirmed(customer, TransactionKind::AdjustmentCharge, 7150),
            confirmed(customer, TransactionKind::AdjustmentRefund, 400),
            confirmed(customer, TransactionKind::Refund, 5250),
        ];
        assert_eq!(ledger_balance(&transactions), 50000 - 7650 - 7150 + 400 + 5250);
    }

    #[test]
    fn test_pending_transactions_do_not_count() {
        let customer = Uuid::new_v4();
        let transactions = vec![
            confirmed(customer, TransactionKind::Recharge, 10000),
            LedgerTransaction::new(customer, TransactionKind::Recharge, 90000, Utc::now()),
        ];
        assert_eq!(ledger_balance(&transactions), 10000);
    }

    #[test]
    fn test_integrity_report() {
        let good = AccountIntegrity {
            customer_id: Uuid::new_v4(),
            name: "Asha".into(),
            stored_balance: 100,
            ledger_balance: 100,
            pending_count: 1,
        };
        let bad = AccountIntegrity {
            stored_balance: 250,
            name: "Ravi".into(),
            ..good.clone()
        };
        assert_eq!(bad.drift(), 150);

        let report = IntegrityReport {
            accounts: vec![good.clone()],
            transaction_count: 3,
            missing_snapshots: 0,
            invalid_amounts: 0,
        };
        assert!(report.is_ok());
        assert_eq!(report.pending_count(), 1);

        let report = IntegrityReport {
            accounts: vec![good, bad],
            ..report
        };
        assert!(!report.is_ok());
        assert_eq!(report.drifted().count(), 1);
    }
}
