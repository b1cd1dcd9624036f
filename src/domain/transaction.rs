use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, ConsumptionId, CustomerId};

pub type TransactionId = Uuid;

/// Kind of a balance-affecting event. Amounts are stored as positive
/// magnitudes; the kind alone decides the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Recharge,
    DeliveryCharge,
    Refund,
    AdjustmentCharge,
    AdjustmentRefund,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::Recharge,
        TransactionKind::DeliveryCharge,
        TransactionKind::Refund,
        TransactionKind::AdjustmentCharge,
        TransactionKind::AdjustmentRefund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Recharge => "recharge",
            TransactionKind::DeliveryCharge => "delivery_charge",
            TransactionKind::Refund => "refund",
            TransactionKind::AdjustmentCharge => "adjustment_charge",
            TransactionKind::AdjustmentRefund => "adjustment_refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Sign applied to the magnitude when the transaction hits the balance.
    pub fn sign(&self) -> i64 {
        match self {
            TransactionKind::Recharge => 1,
            TransactionKind::DeliveryCharge => -1,
            TransactionKind::Refund => 1,
            TransactionKind::AdjustmentCharge => -1,
            TransactionKind::AdjustmentRefund => 1,
        }
    }

    /// Adjustment kind for a cost difference, or `None` when nothing changed.
    pub fn for_cost_diff(cost_diff: Cents) -> Option<(TransactionKind, Cents)> {
        match cost_diff.signum() {
            1 => Some((TransactionKind::AdjustmentCharge, cost_diff)),
            -1 => Some((TransactionKind::AdjustmentRefund, -cost_diff)),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `PendingAcknowledgement -> Confirmed`; confirmed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    PendingAcknowledgement,
    Confirmed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::PendingAcknowledgement => "pending_acknowledgement",
            TransactionStatus::Confirmed => "confirmed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_acknowledgement" => Some(TransactionStatus::PendingAcknowledgement),
            "confirmed" => Some(TransactionStatus::Confirmed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    /// Monotonically increasing write order, assigned by the repository
    pub sequence: i64,
    pub customer_id: CustomerId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    /// Always positive
    pub amount: Cents,
    /// External payment reference (recharges)
    pub reference: Option<String>,
    /// Consumption record that caused a charge, refund or adjustment
    pub consumption_id: Option<ConsumptionId>,
    /// Account balance right after this transaction was applied.
    /// `None` while pending.
    pub balance_after: Option<Cents>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Build a transaction. Sequence number must be assigned by the repository.
    pub fn new(
        customer_id: CustomerId,
        kind: TransactionKind,
        amount: Cents,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            customer_id,
            kind,
            status: TransactionStatus::PendingAcknowledgement,
            amount,
            reference: None,
            consumption_id: None,
            balance_after: None,
            created_at,
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_consumption(mut self, consumption_id: Option<ConsumptionId>) -> Self {
        self.consumption_id = consumption_id;
        self
    }

    pub fn confirmed(mut self, balance_after: Cents) -> Self {
        self.status = TransactionStatus::Confirmed;
        self.balance_after = Some(balance_after);
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }

    /// Effect on the balance once confirmed.
    pub fn signed_amount(&self) -> Cents {
        self.kind.sign() * self.amount
    }
}
