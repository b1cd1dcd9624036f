mod common;

use anyhow::Result;
use common::*;
use mealwallet::application::{AppError, ServiceOptions};
use mealwallet::domain::{
    ConsumptionEntry, ConsumptionUpdate, MealSelection, MealSlot, PricingPolicy, TransactionKind,
};

#[tokio::test]
async fn test_record_charges_the_wallet() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 50000, None).await?;

    let outcome = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;

    assert_eq!(outcome.record.total_cost, 7650);
    assert_eq!(outcome.balance, 42350);

    let charge = outcome.transaction.expect("delivery charge written");
    assert_eq!(charge.kind, TransactionKind::DeliveryCharge);
    assert_eq!(charge.amount, 7650);
    assert_eq!(charge.balance_after, Some(42350));
    assert_eq!(charge.consumption_id, Some(outcome.record.id));

    assert_eq!(service.get_account(customer.id).await?.balance, 42350);
    let stored = service.get_consumption(outcome.record.id).await?;
    assert_eq!(stored.selection, outcome.record.selection);
    assert_eq!(stored.total_cost, 7650);

    Ok(())
}

#[tokio::test]
async fn test_balance_may_go_negative() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;

    let outcome = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;

    assert_eq!(outcome.balance, -7650);
    Ok(())
}

#[tokio::test]
async fn test_upgrade_to_premium_charges_the_difference() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 50000, None).await?;
    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;

    let outcome = service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: MealSlot::Lunch,
                selection: MealSelection::premium("Biryani").with_extras(2, 1),
            },
        )
        .await?;

    // 120.00 + 20.00 + 4.00
    assert_eq!(outcome.record.total_cost, 14400);
    let adjustment = outcome.transaction.expect("adjustment written");
    assert_eq!(adjustment.kind, TransactionKind::AdjustmentCharge);
    assert_eq!(adjustment.amount, 6750);
    assert_eq!(outcome.balance, 35600);
    assert_eq!(
        service.get_consumption(created.record.id).await?.selection.dish_name,
        Some("Biryani".to_string())
    );

    Ok(())
}

#[tokio::test]
async fn test_upgrade_with_premium_at_124() -> Result<()> {
    let options = ServiceOptions {
        pricing: PricingPolicy {
            premium_meal: 12400,
            ..PricingPolicy::default()
        },
        ..ServiceOptions::default()
    };
    let (service, _temp) = test_service_with(options).await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 50000, None).await?;
    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;
    assert_eq!(created.balance, 42350);

    let outcome = service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: MealSlot::Lunch,
                selection: MealSelection::premium("Biryani").with_extras(2, 1),
            },
        )
        .await?;

    assert_eq!(outcome.record.total_cost, 14800);
    assert_eq!(outcome.transaction.map(|t| t.amount), Some(7150));
    assert_eq!(outcome.balance, 35200);
    Ok(())
}

#[tokio::test]
async fn test_downgrade_refunds_the_difference() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    let created = service
        .record_consumption(ConsumptionEntry {
            customer_id: customer.id,
            service_date: date("2024-03-02"),
            meal_slot: MealSlot::Dinner,
            selection: MealSelection::premium("Fish curry"),
        })
        .await?;
    assert_eq!(created.balance, -12000);

    let outcome = service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: MealSlot::Dinner,
                selection: MealSelection::main_meal(),
            },
        )
        .await?;

    let refund = outcome.transaction.expect("adjustment written");
    assert_eq!(refund.kind, TransactionKind::AdjustmentRefund);
    assert_eq!(refund.amount, 6750);
    assert_eq!(outcome.balance, -5250);
    Ok(())
}

#[tokio::test]
async fn test_identical_update_writes_no_transaction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 50000, None).await?;
    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;
    let before = service.list_transactions(customer.id).await?.len();

    let outcome = service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: created.record.meal_slot,
                selection: created.record.selection.clone(),
            },
        )
        .await?;

    assert!(outcome.transaction.is_none());
    assert_eq!(outcome.balance, 42350);
    assert_eq!(service.list_transactions(customer.id).await?.len(), before);
    Ok(())
}

#[tokio::test]
async fn test_slot_change_at_same_cost_only_updates_record() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;

    let outcome = service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: MealSlot::Dinner,
                selection: created.record.selection.clone(),
            },
        )
        .await?;

    assert!(outcome.transaction.is_none());
    assert_eq!(
        service.get_consumption(created.record.id).await?.meal_slot,
        MealSlot::Dinner
    );
    assert_eq!(service.list_transactions(customer.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_create_then_delete_restores_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 50000, None).await?;

    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;
    let deleted = service.delete_consumption(created.record.id).await?;

    let refund = deleted.transaction.expect("refund written");
    assert_eq!(refund.kind, TransactionKind::Refund);
    assert_eq!(refund.amount, 7650);
    assert_eq!(deleted.balance, 50000);
    assert_eq!(service.get_account(customer.id).await?.balance, 50000);
    assert_eq!(service.recorder().count_for_customer(customer.id).await?, 0);

    let err = service.get_consumption(created.record.id).await.unwrap_err();
    assert!(matches!(err, AppError::RecordNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_delete_refunds_the_updated_cost() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    let created = service
        .record_consumption(standard_lunch(customer.id, date("2024-03-02")))
        .await?;
    service
        .update_consumption(
            created.record.id,
            ConsumptionUpdate {
                meal_slot: MealSlot::Lunch,
                selection: MealSelection::extras_only(1, 0),
            },
        )
        .await?;

    let deleted = service.delete_consumption(created.record.id).await?;
    assert_eq!(deleted.record.total_cost, 1000);
    assert_eq!(deleted.balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_zero_cost_record_touches_no_ledger() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;

    let created = service
        .record_consumption(ConsumptionEntry {
            customer_id: customer.id,
            service_date: date("2024-03-02"),
            meal_slot: MealSlot::Breakfast,
            selection: MealSelection::extras_only(0, 0),
        })
        .await?;
    assert_eq!(created.record.total_cost, 0);
    assert!(created.transaction.is_none());

    let deleted = service.delete_consumption(created.record.id).await?;
    assert!(deleted.transaction.is_none());
    assert!(service.list_transactions(customer.id).await?.is_empty());
    assert_eq!(service.get_account(customer.id).await?.balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_rows_are_rejected_without_effect() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    let ghost = uuid::Uuid::new_v4();

    let err = service
        .record_consumption(standard_lunch(ghost, date("2024-03-02")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(id) if id == ghost));
    assert!(
        service
            .list_consumption_for_date(date("2024-03-02"), None)
            .await?
            .is_empty()
    );

    let err = service.delete_consumption(ghost).await.unwrap_err();
    assert!(matches!(err, AppError::RecordNotFound(_)));

    let err = service
        .update_consumption(
            ghost,
            ConsumptionUpdate {
                meal_slot: MealSlot::Lunch,
                selection: MealSelection::main_meal(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RecordNotFound(_)));

    assert_eq!(service.get_account(customer.id).await?.balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_overflowing_extras_are_invalid() -> Result<()> {
    let options = ServiceOptions {
        pricing: PricingPolicy {
            extra_rice: i64::MAX / 2,
            ..PricingPolicy::default()
        },
        ..ServiceOptions::default()
    };
    let (service, _temp) = test_service_with(options).await?;
    let customer = open_customer(&service, "Asha").await?;

    let err = service
        .record_consumption(ConsumptionEntry {
            customer_id: customer.id,
            service_date: date("2024-03-02"),
            meal_slot: MealSlot::Lunch,
            selection: MealSelection::extras_only(3, 0),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidAmount(_)));
    assert_eq!(service.recorder().count_for_customer(customer.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_daily_sheet_groups_by_customer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ravi = open_customer(&service, "Ravi").await?;
    let asha = open_customer(&service, "Asha").await?;
    let day = date("2024-03-02");

    service.record_consumption(standard_lunch(ravi.id, day)).await?;
    service.record_consumption(standard_lunch(asha.id, day)).await?;
    service
        .record_consumption(ConsumptionEntry {
            meal_slot: MealSlot::Dinner,
            ..standard_lunch(asha.id, day)
        })
        .await?;
    service
        .record_consumption(standard_lunch(asha.id, date("2024-03-03")))
        .await?;

    let sheet = service.list_consumption_for_date(day, None).await?;
    let rows: Vec<(&str, MealSlot)> = sheet
        .iter()
        .map(|e| (e.customer_name.as_str(), e.record.meal_slot))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Asha", MealSlot::Dinner),
            ("Asha", MealSlot::Lunch),
            ("Ravi", MealSlot::Lunch),
        ]
    );

    let only_ravi = service.list_consumption_for_date(day, Some(ravi.id)).await?;
    assert_eq!(only_ravi.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_debits_do_not_lose_updates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let customer = open_customer(&service, "Asha").await?;
    service.recharge(customer.id, 100000, None).await?;

    let mut handles = Vec::new();
    for day in 1..=10 {
        let service = service.clone();
        let entry = standard_lunch(customer.id, date(&format!("2024-03-{:02}", day)));
        handles.push(tokio::spawn(
            async move { service.record_consumption(entry).await },
        ));
    }
    for handle in handles {
        handle.await??;
    }

    let account = service.get_account(customer.id).await?;
    assert_eq!(account.balance, 100000 - 10 * 7650);
    assert!(service.verify_account(customer.id).await?.is_consistent());

    let mut snapshots: Vec<i64> = service
        .list_transactions(customer.id)
        .await?
        .iter()
        .filter(|t| t.kind == TransactionKind::DeliveryCharge)
        .filter_map(|t| t.balance_after)
        .collect();
    snapshots.sort();
    snapshots.dedup();
    assert_eq!(snapshots.len(), 10);
    Ok(())
}
