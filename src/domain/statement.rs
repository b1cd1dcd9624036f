use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Account, Cents, ConsumptionRecord, LedgerTransaction};

/// Inclusive range of service dates. Day boundaries are UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Instant the range opens; the opening balance is the last snapshot
    /// strictly before it.
    pub fn opens_at(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    /// Exclusive upper bound: midnight after `end`.
    pub fn closes_at(&self) -> DateTime<Utc> {
        let next = self.end.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
        start_of_day(next)
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Bill for one customer over a date range. Built on request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub account: Account,
    pub range: DateRange,
    /// Ordered by date, then dinner before lunch
    pub records: Vec<ConsumptionRecord>,
    /// Confirmed transactions created inside the range, in ledger order
    pub transactions: Vec<LedgerTransaction>,
    pub total_spent: Cents,
    pub total_recharges: Cents,
    pub opening_balance: Cents,
    /// Current balance at generation time, not the balance at `range.end`
    pub closing_balance: Cents,
    pub generated_at: DateTime<Utc>,
}

impl Statement {
    /// Sum of confirmed signed amounts inside the range.
    pub fn net_movement(&self) -> Cents {
        self.transactions.iter().map(LedgerTransaction::signed_amount).sum()
    }
}

pub fn total_spent(records: &[ConsumptionRecord]) -> Cents {
    records.iter().map(|r| r.total_cost).sum()
}
