//! Maps stored records into the plain snapshot the insight job reads.

use chrono::{DateTime, Utc};

use stockflow_accounting::{LedgerEntry, LedgerEntryType};
use stockflow_core::{BusinessId, DomainError};
use stockflow_insights::{
    BusinessHealthJob, BusinessSnapshot, InsightConfig, InsightReport, LedgerKind,
    LedgerSnapshot, LotSnapshot, OrderLineSnapshot, ProductSnapshot, UsageSnapshot,
};
use stockflow_inventory::{InventoryLot, InventoryUsage};
use stockflow_orders::OrderSnapshot;
use stockflow_products::Product;

/// Products keep their catalog order.
pub fn business_snapshot(
    business_id: BusinessId,
    products: &[Product],
    lots: &[InventoryLot],
    usages: &[InventoryUsage],
    orders: &[OrderSnapshot],
    ledger: &[LedgerEntry],
) -> BusinessSnapshot {
    let products = products
        .iter()
        .map(|product| ProductSnapshot {
            product_id: *product.id.as_uuid(),
            name: product.name.clone(),
            unit: product.unit.clone(),
            reorder_level: product.reorder_level,
            lots: lots
                .iter()
                .filter(|l| l.product_id == product.id)
                .map(|l| LotSnapshot {
                    remaining_qty: l.remaining_qty,
                    received_at: l.received_at,
                })
                .collect(),
            usages: usages
                .iter()
                .filter(|u| u.product_id == product.id)
                .map(|u| UsageSnapshot {
                    quantity: u.quantity,
                    used_at: u.used_at,
                })
                .collect(),
            order_lines: orders
                .iter()
                .flat_map(|o| {
                    o.items
                        .iter()
                        .filter(|i| i.product_id == product.id)
                        .map(|i| OrderLineSnapshot {
                            quantity: i.quantity,
                            order_created_at: o.created_at,
                        })
                })
                .collect(),
        })
        .collect();

    let ledger = ledger
        .iter()
        .map(|e| LedgerSnapshot {
            kind: match e.entry_type {
                LedgerEntryType::Purchase => LedgerKind::Purchase,
                LedgerEntryType::Sale => LedgerKind::Sale,
                LedgerEntryType::StockIn => LedgerKind::StockIn,
            },
            total_amount: e.total_amount,
            created_at: e.created_at,
        })
        .collect();

    BusinessSnapshot {
        business_id,
        products,
        ledger,
    }
}

/// Run the business-health pass over `snapshot` on behalf of `requester`.
///
/// A snapshot assembled for another business is refused.
pub fn run_business_health(
    requester: BusinessId,
    snapshot: BusinessSnapshot,
    now: DateTime<Utc>,
    config: &InsightConfig,
) -> Result<InsightReport, DomainError> {
    BusinessHealthJob::new(requester, snapshot, now)
        .with_config(config.clone())
        .run()
        .map_err(|e| DomainError::invariant(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn requester_must_own_the_snapshot() {
        let owner = BusinessId::new();
        let snapshot = business_snapshot(owner, &[], &[], &[], &[], &[]);

        let report =
            run_business_health(owner, snapshot.clone(), test_now(), &InsightConfig::default())
                .unwrap();
        assert_eq!(report.business_id, owner);
        assert!(report.advisories.is_empty());

        let err = run_business_health(BusinessId::new(), snapshot, test_now(), &InsightConfig::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
