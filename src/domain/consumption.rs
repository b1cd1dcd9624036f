use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CustomerId};

pub type ConsumptionId = Uuid;

/// Meal slot of a delivery. Declaration order is the time of day, so the
/// derived `Ord` ranks dinner highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealSlot::Breakfast),
            "lunch" => Some(MealSlot::Lunch),
            "dinner" => Some(MealSlot::Dinner),
            _ => None,
        }
    }
}

impl std::fmt::Display for MealSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the customer actually took for one slot. This is the only input to
/// pricing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSelection {
    pub has_main_meal: bool,
    pub is_premium: bool,
    pub dish_name: Option<String>,
    pub extra_rice: u32,
    pub extra_bread: u32,
}

impl MealSelection {
    pub fn main_meal() -> Self {
        Self {
            has_main_meal: true,
            ..Self::default()
        }
    }

    pub fn premium(dish_name: impl Into<String>) -> Self {
        Self {
            has_main_meal: true,
            is_premium: true,
            dish_name: Some(dish_name.into()),
            ..Self::default()
        }
    }

    pub fn extras_only(extra_rice: u32, extra_bread: u32) -> Self {
        Self::default().with_extras(extra_rice, extra_bread)
    }

    pub fn with_extras(mut self, extra_rice: u32, extra_bread: u32) -> Self {
        self.extra_rice = extra_rice;
        self.extra_bread = extra_bread;
        self
    }
}

/// A consumption event reported by the kitchen, before it is costed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub customer_id: CustomerId,
    pub service_date: NaiveDate,
    pub meal_slot: MealSlot,
    pub selection: MealSelection,
}

/// Replacement fields for an existing record. Owner and date never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionUpdate {
    pub meal_slot: MealSlot,
    pub selection: MealSelection,
}

/// A costed daily log line. `total_cost` is fixed when the record is written
/// and only changes through an explicit update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: ConsumptionId,
    pub customer_id: CustomerId,
    pub service_date: NaiveDate,
    pub meal_slot: MealSlot,
    #[serde(flatten)]
    pub selection: MealSelection,
    pub total_cost: Cents,
    pub recorded_at: DateTime<Utc>,
}

impl ConsumptionRecord {
    pub fn new(entry: ConsumptionEntry, total_cost: Cents, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: entry.customer_id,
            service_date: entry.service_date,
            meal_slot: entry.meal_slot,
            selection: entry.selection,
            total_cost,
            recorded_at,
        }
    }

    /// Apply an update and return the cost difference (new minus old).
    pub fn apply_update(&mut self, update: ConsumptionUpdate, new_cost: Cents) -> Cents {
        let cost_diff = new_cost - self.total_cost;
        self.meal_slot = update.meal_slot;
        self.selection = update.selection;
        self.total_cost = new_cost;
        cost_diff
    }
}

/// Statement order: date ascending, then later slots first within a day.
pub fn statement_order(a: &ConsumptionRecord, b: &ConsumptionRecord) -> Ordering {
    a.service_date
        .cmp(&b.service_date)
        .then_with(|| b.meal_slot.cmp(&a.meal_slot))
}
