use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::money::ensure_positive;
use stockflow_core::{BusinessId, DomainResult, Quantity};
use stockflow_products::ProductId;

stockflow_core::domain_id!(UsageId, "Inventory usage record identifier.");

/// Reason recorded when a caller does not give one.
pub const DEFAULT_USAGE_REASON: &str = "Manual usage";

/// Record of stock consumed from a product.
///
/// Usage is tracked per product, not per lot; the lot deductions of an
/// allocation are returned to the caller but not persisted alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUsage {
    pub id: UsageId,
    pub business_id: BusinessId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub reason: String,
    pub used_at: DateTime<Utc>,
}

impl InventoryUsage {
    pub fn record(
        business_id: BusinessId,
        product_id: ProductId,
        quantity: Quantity,
        reason: Option<&str>,
        used_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        ensure_positive(quantity, "usage quantity")?;
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_USAGE_REASON);

        Ok(Self {
            id: UsageId::generate(),
            business_id,
            product_id,
            quantity,
            reason: reason.to_string(),
            used_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reason_falls_back_to_default() {
        let usage =
            InventoryUsage::record(BusinessId::new(), ProductId::generate(), 3, Some("  "), Utc::now())
                .unwrap();
        assert_eq!(usage.reason, DEFAULT_USAGE_REASON);

        let usage = InventoryUsage::record(
            BusinessId::new(),
            ProductId::generate(),
            3,
            Some("Cutting floor"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(usage.reason, "Cutting floor");
    }
}
