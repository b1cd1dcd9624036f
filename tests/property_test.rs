//! Property-based tests for the wallet invariants
//!
//! Random sequences of recharges and consumption edits must keep every
//! stored balance equal to the signed sum of its confirmed ledger.

use chrono::NaiveDate;
use mealwallet::application::{ServiceOptions, WalletService};
use mealwallet::domain::{
    Cents, ConsumptionEntry, ConsumptionId, ConsumptionUpdate, MealSelection, MealSlot,
    NewCustomer, PricingPolicy,
};
use proptest::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Recharge(Cents),
    Record(MealSelection),
    Update(usize, MealSelection),
    Delete(usize),
}

fn selection_strategy() -> impl Strategy<Value = MealSelection> {
    (any::<bool>(), any::<bool>(), 0u32..4, 0u32..4).prop_map(|(main, premium, rice, bread)| {
        MealSelection {
            has_main_meal: main,
            is_premium: premium,
            dish_name: None,
            extra_rice: rice,
            extra_bread: bread,
        }
    })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..100_000).prop_map(Op::Recharge),
        selection_strategy().prop_map(Op::Record),
        (any::<usize>(), selection_strategy()).prop_map(|(i, s)| Op::Update(i, s)),
        any::<usize>().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: after every operation the stored balance matches both the
    /// ledger and a model computed from the operations alone
    #[test]
    fn balance_always_matches_ledger(ops in prop::collection::vec(op_strategy(), 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let temp = TempDir::new()?;
            let service =
                WalletService::open(temp.path().join("prop.db"), ServiceOptions::default()).await?;
            let customer = service.open_account(NewCustomer::new("Asha")).await?;
            let pricing = PricingPolicy::default();
            let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

            let mut expected: Cents = 0;
            let mut records: Vec<(ConsumptionId, Cents)> = Vec::new();

            for op in ops {
                match op {
                    Op::Recharge(amount) => {
                        service.recharge(customer.id, amount, None).await?;
                        expected += amount;
                    }
                    Op::Record(selection) => {
                        let cost = pricing.cost_of(&selection).unwrap();
                        let outcome = service
                            .record_consumption(ConsumptionEntry {
                                customer_id: customer.id,
                                service_date: day,
                                meal_slot: MealSlot::Lunch,
                                selection,
                            })
                            .await?;
                        prop_assert_eq!(outcome.record.total_cost, cost);
                        records.push((outcome.record.id, cost));
                        expected -= cost;
                    }
                    Op::Update(i, selection) => {
                        if records.is_empty() {
                            continue;
                        }
                        let idx = i % records.len();
                        let (id, old_cost) = records[idx];
                        let new_cost = pricing.cost_of(&selection).unwrap();
                        let outcome = service
                            .update_consumption(
                                id,
                                ConsumptionUpdate {
                                    meal_slot: MealSlot::Dinner,
                                    selection,
                                },
                            )
                            .await?;
                        prop_assert_eq!(outcome.transaction.is_none(), new_cost == old_cost);
                        records[idx].1 = new_cost;
                        expected += old_cost - new_cost;
                    }
                    Op::Delete(i) => {
                        if records.is_empty() {
                            continue;
                        }
                        let (id, cost) = records.remove(i % records.len());
                        let outcome = service.delete_consumption(id).await?;
                        prop_assert_eq!(outcome.record.total_cost, cost);
                        expected += cost;
                    }
                }

                let integrity = service.verify_account(customer.id).await?;
                prop_assert!(integrity.is_consistent());
                prop_assert_eq!(integrity.stored_balance, expected);
            }

            prop_assert!(service.check_integrity().await?.is_ok());
            service.close().await;
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: creating then deleting a record is an exact inverse
    #[test]
    fn create_then_delete_is_neutral(selection in selection_strategy(), start in 0i64..100_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let temp = TempDir::new()?;
            let service =
                WalletService::open(temp.path().join("prop.db"), ServiceOptions::default()).await?;
            let customer = service.open_account(NewCustomer::new("Asha")).await?;
            if start > 0 {
                service.recharge(customer.id, start, None).await?;
            }

            let created = service
                .record_consumption(ConsumptionEntry {
                    customer_id: customer.id,
                    service_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                    meal_slot: MealSlot::Lunch,
                    selection,
                })
                .await?;
            let deleted = service.delete_consumption(created.record.id).await?;

            prop_assert_eq!(deleted.balance, start);
            prop_assert_eq!(service.recorder().count_for_customer(customer.id).await?, 0);
            service.close().await;
            Ok::<(), TestCaseError>(())
        })?;
    }
}
