use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::money::ensure_positive;
use stockflow_core::{Amount, BusinessId, DomainError, DomainResult, Quantity, line_total};
use stockflow_orders::OrderId;
use stockflow_products::ProductId;

stockflow_core::domain_id!(LotId, "Inventory lot identifier.");

/// One receipt batch of a product.
///
/// Lots are never merged or deleted. A fully consumed lot stays around with
/// `remaining_qty == 0` as receipt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    pub id: LotId,
    pub lot_number: String,
    pub business_id: BusinessId,
    pub product_id: ProductId,
    /// Quantity originally received.
    pub quantity: Quantity,
    /// Quantity still available; `0 <= remaining_qty <= quantity`.
    pub remaining_qty: Quantity,
    pub cost_per_unit: Amount,
    pub received_at: DateTime<Utc>,
    /// Order whose delivery produced this lot, if any.
    pub order_id: Option<OrderId>,
}

/// Input for receiving a new lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveLot {
    pub product_id: ProductId,
    pub lot_number: String,
    pub quantity: Quantity,
    pub cost_per_unit: Amount,
    pub received_at: DateTime<Utc>,
    pub order_id: Option<OrderId>,
}

impl InventoryLot {
    /// Receive a fresh lot with the full quantity remaining.
    pub fn receive(business_id: BusinessId, input: ReceiveLot) -> DomainResult<Self> {
        ensure_positive(input.quantity, "lot quantity")?;
        if input.cost_per_unit < 0 {
            return Err(DomainError::invalid_quantity(format!(
                "cost per unit cannot be negative (got {})",
                input.cost_per_unit
            )));
        }
        if input.lot_number.trim().is_empty() {
            return Err(DomainError::validation("lot number cannot be empty"));
        }

        Ok(Self {
            id: LotId::generate(),
            lot_number: input.lot_number,
            business_id,
            product_id: input.product_id,
            quantity: input.quantity,
            remaining_qty: input.quantity,
            cost_per_unit: input.cost_per_unit,
            received_at: input.received_at,
            order_id: input.order_id,
        })
    }

    /// Take `quantity` out of the lot.
    pub fn deduct(&mut self, quantity: Quantity) -> DomainResult<()> {
        ensure_positive(quantity, "deduction")?;
        if quantity > self.remaining_qty {
            return Err(DomainError::invariant(format!(
                "lot {} has {} remaining, cannot deduct {}",
                self.lot_number, self.remaining_qty, quantity
            )));
        }
        self.remaining_qty -= quantity;
        Ok(())
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_qty == 0
    }

    /// Value of the stock still on hand in this lot.
    pub fn remaining_value(&self) -> DomainResult<Amount> {
        line_total(self.remaining_qty, self.cost_per_unit)
    }

    /// Check the bounds of `remaining_qty` (used on rows loaded from storage).
    pub fn check_bounds(&self) -> DomainResult<()> {
        if self.remaining_qty < 0 || self.remaining_qty > self.quantity {
            return Err(DomainError::invariant(format!(
                "lot {} remaining {} outside 0..={}",
                self.lot_number, self.remaining_qty, self.quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receive(quantity: Quantity, cost: Amount) -> DomainResult<InventoryLot> {
        InventoryLot::receive(
            BusinessId::new(),
            ReceiveLot {
                product_id: ProductId::generate(),
                lot_number: "LOT-TEST-001".to_string(),
                quantity,
                cost_per_unit: cost,
                received_at: Utc::now(),
                order_id: None,
            },
        )
    }

    #[test]
    fn received_lot_is_full() {
        let lot = receive(100, 10).unwrap();
        assert_eq!(lot.remaining_qty, 100);
        assert_eq!(lot.remaining_value().unwrap(), 1000);
    }

    #[test]
    fn zero_quantity_and_negative_cost_are_rejected() {
        assert!(matches!(receive(0, 10), Err(DomainError::InvalidQuantity(_))));
        assert!(matches!(receive(5, -1), Err(DomainError::InvalidQuantity(_))));
    }

    #[test]
    fn deduct_never_goes_below_zero() {
        let mut lot = receive(5, 1).unwrap();
        lot.deduct(5).unwrap();
        assert!(lot.is_depleted());

        let err = lot.deduct(1).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(lot.remaining_qty, 0);
    }
}
