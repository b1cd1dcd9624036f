// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use mealwallet::application::{ServiceOptions, WalletService};
use mealwallet::domain::{
    Account, ConsumptionEntry, CustomerId, LedgerTransaction, MealSelection, MealSlot, NewCustomer,
};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(WalletService, TempDir)> {
    test_service_with(ServiceOptions::default()).await
}

pub async fn test_service_with(options: ServiceOptions) -> Result<(WalletService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = WalletService::open(&db_path, options).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Helper to parse "YYYY-MM-DD HH:MM" into DateTime<Utc>
pub fn at(datetime_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M")
        .unwrap()
        .and_utc()
}

pub async fn open_customer(service: &WalletService, name: &str) -> Result<Account> {
    Ok(service
        .open_account(NewCustomer::new(name).with_address("B2", "104"))
        .await?)
}

/// Recharge with an explicit timestamp so statements can be tested.
pub async fn recharge_at(
    service: &WalletService,
    customer_id: CustomerId,
    amount: i64,
    when: DateTime<Utc>,
) -> Result<LedgerTransaction> {
    Ok(service
        .recharges()
        .recharge(customer_id, amount, None, when)
        .await?)
}

/// Standard main meal, 2 extra rice, 1 extra bread: 76.50 at default prices.
pub fn standard_lunch(customer_id: CustomerId, service_date: NaiveDate) -> ConsumptionEntry {
    ConsumptionEntry {
        customer_id,
        service_date,
        meal_slot: MealSlot::Lunch,
        selection: MealSelection::main_meal().with_extras(2, 1),
    }
}
