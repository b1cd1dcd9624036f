use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type CustomerId = Uuid;

/// A customer together with their prepaid wallet.
///
/// `balance` is a cache of the confirmed ledger: it only moves together with
/// a ledger transaction written in the same unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: CustomerId,
    pub name: String,
    pub mobile_no: Option<String>,
    pub building_no: Option<String>,
    pub room_no: Option<String>,
    pub plan: Option<String>,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

/// Profile data needed to open an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub mobile_no: Option<String>,
    pub building_no: Option<String>,
    pub room_no: Option<String>,
    pub plan: Option<String>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_mobile_no(mut self, mobile_no: impl Into<String>) -> Self {
        self.mobile_no = Some(mobile_no.into());
        self
    }

    pub fn with_address(mut self, building_no: impl Into<String>, room_no: impl Into<String>) -> Self {
        self.building_no = Some(building_no.into());
        self.room_no = Some(room_no.into());
        self
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }
}

impl Account {
    /// Open an account with an empty wallet.
    pub fn open(customer: NewCustomer, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: customer.name,
            mobile_no: customer.mobile_no,
            building_no: customer.building_no,
            room_no: customer.room_no,
            plan: customer.plan,
            balance: 0,
            created_at: now,
        }
    }

    /// Delivery address as "building/room", when both are known.
    pub fn address(&self) -> Option<String> {
        match (&self.building_no, &self.room_no) {
            (Some(building), Some(room)) => Some(format!("{}/{}", building, room)),
            (Some(building), None) => Some(building.clone()),
            (None, Some(room)) => Some(room.clone()),
            (None, None) => None,
        }
    }
}
