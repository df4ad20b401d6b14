//! FIFO allocation over a product's lots.
//!
//! Allocation is split in two steps so a shortfall never leaves partial
//! deductions behind:
//! 1. [`plan_allocation`] walks the lots oldest-first and decides every
//!    deduction, failing with `InsufficientStock` before anything changes.
//! 2. [`AllocationPlan::apply`] performs the planned deductions.
//!
//! Callers hold the product's lots under a lock between the two steps.

use serde::{Deserialize, Serialize};

use stockflow_core::money::{checked_sum, ensure_positive};
use stockflow_core::{DomainError, DomainResult, Quantity};
use stockflow_products::ProductId;

use crate::lot::{InventoryLot, LotId};

/// Quantity taken from one lot by an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDeduction {
    pub lot_id: LotId,
    pub lot_number: String,
    pub quantity: Quantity,
    /// Lot remaining quantity once the deduction is applied.
    pub remaining_after: Quantity,
}

/// Deductions decided for one allocation request, oldest lot first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub product_id: ProductId,
    pub requested: Quantity,
    pub deductions: Vec<LotDeduction>,
}

/// Sort lots into consumption order: `received_at` ascending, ties broken by
/// the time-ordered id (creation order), then lot number.
pub fn fifo_sort(lots: &mut [InventoryLot]) {
    lots.sort_by(|a, b| {
        a.received_at
            .cmp(&b.received_at)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| a.lot_number.cmp(&b.lot_number))
    });
}

/// Decide which lots cover `quantity` of `product_id`.
///
/// Only lots of `product_id` with stock left are considered. Nothing is
/// mutated.
pub fn plan_allocation(
    product_id: ProductId,
    lots: &[InventoryLot],
    quantity: Quantity,
) -> DomainResult<AllocationPlan> {
    ensure_positive(quantity, "allocation quantity")?;

    let mut candidates: Vec<InventoryLot> = lots
        .iter()
        .filter(|l| l.product_id == product_id && l.remaining_qty > 0)
        .cloned()
        .collect();
    fifo_sort(&mut candidates);

    let available = checked_sum(candidates.iter().map(|l| l.remaining_qty))?;
    if available < quantity {
        return Err(DomainError::insufficient_stock(quantity, available));
    }

    let mut outstanding = quantity;
    let mut deductions = Vec::new();
    for lot in &candidates {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(lot.remaining_qty);
        deductions.push(LotDeduction {
            lot_id: lot.id,
            lot_number: lot.lot_number.clone(),
            quantity: take,
            remaining_after: lot.remaining_qty - take,
        });
        outstanding -= take;
    }

    Ok(AllocationPlan {
        product_id,
        requested: quantity,
        deductions,
    })
}

impl AllocationPlan {
    pub fn allocated(&self) -> Quantity {
        self.deductions.iter().map(|d| d.quantity).sum()
    }

    /// Apply the planned deductions to `lots`.
    ///
    /// Fails with `InvariantViolation` if a planned lot is missing or no longer
    /// holds the planned remaining quantity; in that case `lots` is untouched.
    pub fn apply(&self, lots: &mut [InventoryLot]) -> DomainResult<()> {
        let mut positions = Vec::with_capacity(self.deductions.len());
        for d in &self.deductions {
            let idx = lots
                .iter()
                .position(|l| l.id == d.lot_id)
                .ok_or_else(|| DomainError::invariant(format!("lot {} vanished", d.lot_number)))?;
            if lots[idx].remaining_qty != d.remaining_after + d.quantity {
                return Err(DomainError::invariant(format!(
                    "lot {} changed since allocation was planned",
                    d.lot_number
                )));
            }
            positions.push(idx);
        }

        for (d, idx) in self.deductions.iter().zip(positions) {
            lots[idx].deduct(d.quantity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::ReceiveLot;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use stockflow_core::BusinessId;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn lots_of(product_id: ProductId, sizes: &[Quantity]) -> Vec<InventoryLot> {
        let business_id = BusinessId::new();
        sizes
            .iter()
            .enumerate()
            .map(|(i, qty)| {
                InventoryLot::receive(
                    business_id,
                    ReceiveLot {
                        product_id,
                        lot_number: format!("LOT-{i:03}"),
                        quantity: *qty,
                        cost_per_unit: 10,
                        received_at: t0() + Duration::days(i as i64),
                        order_id: None,
                    },
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn consumes_oldest_lots_first() {
        let product = ProductId::generate();
        let mut lots = lots_of(product, &[5, 5, 5]);

        let plan = plan_allocation(product, &lots, 7).unwrap();
        let taken: Vec<Quantity> = plan.deductions.iter().map(|d| d.quantity).collect();
        assert_eq!(taken, vec![5, 2]);

        plan.apply(&mut lots).unwrap();
        let remaining: Vec<Quantity> = lots.iter().map(|l| l.remaining_qty).collect();
        assert_eq!(remaining, vec![0, 3, 5]);
    }

    #[test]
    fn shortfall_reports_available_and_changes_nothing() {
        let product = ProductId::generate();
        let lots = lots_of(product, &[5, 5, 5]);

        let err = plan_allocation(product, &lots, 16).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
            } => {
                assert_eq!(requested, 16);
                assert_eq!(available, 15);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert!(lots.iter().all(|l| l.remaining_qty == 5));
    }

    #[test]
    fn receipt_order_wins_over_storage_order() {
        let product = ProductId::generate();
        let mut lots = lots_of(product, &[4, 6]);
        lots.reverse();

        let plan = plan_allocation(product, &lots, 5).unwrap();
        assert_eq!(plan.deductions[0].lot_number, "LOT-000");
        assert_eq!(plan.deductions[0].quantity, 4);
        assert_eq!(plan.deductions[1].quantity, 1);
    }

    #[test]
    fn same_instant_lots_drain_in_creation_order() {
        let product = ProductId::generate();
        let business_id = BusinessId::new();
        // Lot numbers sort against creation order.
        let mut lots: Vec<InventoryLot> = ["LOT-Z", "LOT-A"]
            .into_iter()
            .map(|number| {
                InventoryLot::receive(
                    business_id,
                    ReceiveLot {
                        product_id: product,
                        lot_number: number.to_string(),
                        quantity: 5,
                        cost_per_unit: 10,
                        received_at: t0(),
                        order_id: None,
                    },
                )
                .unwrap()
            })
            .collect();
        let first = lots[0].id;
        lots.reverse();

        let plan = plan_allocation(product, &lots, 5).unwrap();
        assert_eq!(plan.deductions.len(), 1);
        assert_eq!(plan.deductions[0].lot_id, first);
    }

    #[test]
    fn other_products_and_empty_lots_are_skipped() {
        let product = ProductId::generate();
        let mut lots = lots_of(product, &[3, 3]);
        lots[0].remaining_qty = 0;
        lots.extend(lots_of(ProductId::generate(), &[100]));

        let plan = plan_allocation(product, &lots, 2).unwrap();
        assert_eq!(plan.deductions.len(), 1);
        assert_eq!(plan.deductions[0].lot_id, lots[1].id);
    }

    #[test]
    fn stale_plan_is_refused() {
        let product = ProductId::generate();
        let mut lots = lots_of(product, &[5]);
        let plan = plan_allocation(product, &lots, 3).unwrap();

        lots[0].remaining_qty = 4;
        let err = plan.apply(&mut lots).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(lots[0].remaining_qty, 4);
    }

    #[test]
    fn zero_request_is_invalid_quantity() {
        let product = ProductId::generate();
        let lots = lots_of(product, &[5]);
        assert!(matches!(
            plan_allocation(product, &lots, 0),
            Err(DomainError::InvalidQuantity(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a sequence of allocations never drives any lot negative and
        /// never hands out more than was received.
        #[test]
        fn allocations_never_oversell(
            sizes in prop::collection::vec(1i64..50, 1..8),
            requests in prop::collection::vec(1i64..40, 1..12),
        ) {
            let product = ProductId::generate();
            let mut lots = lots_of(product, &sizes);
            let received: i64 = sizes.iter().sum();
            let mut handed_out = 0i64;

            for request in requests {
                let before: Vec<Quantity> = lots.iter().map(|l| l.remaining_qty).collect();
                match plan_allocation(product, &lots, request) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.allocated(), request);
                        plan.apply(&mut lots).unwrap();
                        handed_out += request;
                    }
                    Err(DomainError::InsufficientStock { available, .. }) => {
                        prop_assert!(available < request);
                        let after: Vec<Quantity> = lots.iter().map(|l| l.remaining_qty).collect();
                        prop_assert_eq!(before, after);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }

            prop_assert!(lots.iter().all(|l| l.remaining_qty >= 0 && l.remaining_qty <= l.quantity));
            let remaining: i64 = lots.iter().map(|l| l.remaining_qty).sum();
            prop_assert_eq!(received - handed_out, remaining);
        }

        /// Property: a newer lot is only touched once every older lot is empty.
        #[test]
        fn newer_lots_wait_for_older_ones(
            sizes in prop::collection::vec(1i64..50, 1..8),
            request in 1i64..200,
        ) {
            let product = ProductId::generate();
            let mut lots = lots_of(product, &sizes);
            if let Ok(plan) = plan_allocation(product, &lots, request) {
                plan.apply(&mut lots).unwrap();
                let first_partial = lots.iter().position(|l| l.remaining_qty > 0);
                if let Some(idx) = first_partial {
                    prop_assert!(lots[idx + 1..].iter().all(|l| l.remaining_qty == l.quantity));
                }
            }
        }
    }
}
