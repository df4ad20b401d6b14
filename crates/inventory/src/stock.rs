//! Derived stock figures for one product.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::money::checked_sum;
use stockflow_core::{DomainError, DomainResult, Quantity};
use stockflow_products::ProductId;

use crate::lot::InventoryLot;
use crate::usage::InventoryUsage;

/// Receipt vs consumption reconciliation for one product.
///
/// Every unit received into a lot is either still in a lot or was recorded as
/// usage, so `received - consumed == remaining` must hold at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAudit {
    pub product_id: ProductId,
    pub received: Quantity,
    pub consumed: Quantity,
    pub remaining: Quantity,
    pub balanced: bool,
}

impl StockAudit {
    pub fn compute(
        product_id: ProductId,
        lots: &[InventoryLot],
        usages: &[InventoryUsage],
    ) -> DomainResult<Self> {
        let lots = lots.iter().filter(|l| l.product_id == product_id);
        let received = checked_sum(lots.clone().map(|l| l.quantity))?;
        let remaining = checked_sum(lots.map(|l| l.remaining_qty))?;
        let consumed = checked_sum(
            usages
                .iter()
                .filter(|u| u.product_id == product_id)
                .map(|u| u.quantity),
        )?;

        Ok(Self {
            product_id,
            received,
            consumed,
            remaining,
            balanced: received - consumed == remaining,
        })
    }
}

/// Stock position and burn rate of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub total_stock: Quantity,
    /// All usage ever recorded.
    pub total_used: Quantity,
    /// Usage inside the trailing window.
    pub recent_used: Quantity,
    /// `recent_used / window_days`, rounded to two decimals.
    pub daily_usage_rate: f64,
    /// `total_stock / daily rate` rounded; `None` without recent usage.
    pub days_remaining: Option<i64>,
    pub is_low_stock: bool,
}

impl StockLevel {
    /// Usage counts as recent when `now - window_days < used_at <= now`.
    pub fn compute(
        product_id: ProductId,
        reorder_level: Quantity,
        lots: &[InventoryLot],
        usages: &[InventoryUsage],
        now: DateTime<Utc>,
        window_days: u32,
    ) -> DomainResult<Self> {
        let window_start = now
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "a {window_days} day usage window reaches before the earliest representable date"
                ))
            })?;
        let total_stock = checked_sum(
            lots.iter()
                .filter(|l| l.product_id == product_id)
                .map(|l| l.remaining_qty),
        )?;
        let usages: Vec<&InventoryUsage> = usages
            .iter()
            .filter(|u| u.product_id == product_id)
            .collect();
        let total_used = checked_sum(usages.iter().map(|u| u.quantity))?;
        let recent_used = checked_sum(
            usages
                .iter()
                .filter(|u| u.used_at > window_start && u.used_at <= now)
                .map(|u| u.quantity),
        )?;

        let daily = if window_days == 0 {
            0.0
        } else {
            recent_used as f64 / f64::from(window_days)
        };
        let days_remaining = (daily > 0.0).then(|| (total_stock as f64 / daily).round() as i64);

        Ok(Self {
            product_id,
            total_stock,
            total_used,
            recent_used,
            daily_usage_rate: (daily * 100.0).round() / 100.0,
            days_remaining,
            is_low_stock: total_stock <= reorder_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::ReceiveLot;
    use chrono::TimeZone;
    use stockflow_core::BusinessId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    fn lot(business_id: BusinessId, product_id: ProductId, qty: Quantity) -> InventoryLot {
        InventoryLot::receive(
            business_id,
            ReceiveLot {
                product_id,
                lot_number: "LOT-1".to_string(),
                quantity: qty,
                cost_per_unit: 10,
                received_at: now() - Duration::days(40),
                order_id: None,
            },
        )
        .unwrap()
    }

    fn usage(
        business_id: BusinessId,
        product_id: ProductId,
        qty: Quantity,
        days_ago: i64,
    ) -> InventoryUsage {
        InventoryUsage::record(
            business_id,
            product_id,
            qty,
            None,
            now() - Duration::days(days_ago),
        )
        .unwrap()
    }

    #[test]
    fn audit_balances_after_consumption() {
        let b = BusinessId::new();
        let p = ProductId::generate();
        let mut lots = vec![lot(b, p, 100)];
        lots[0].deduct(30).unwrap();
        let usages = vec![usage(b, p, 30, 1)];

        let audit = StockAudit::compute(p, &lots, &usages).unwrap();
        assert_eq!((audit.received, audit.consumed, audit.remaining), (100, 30, 70));
        assert!(audit.balanced);
    }

    #[test]
    fn audit_flags_untracked_deduction() {
        let b = BusinessId::new();
        let p = ProductId::generate();
        let mut lots = vec![lot(b, p, 10)];
        lots[0].deduct(4).unwrap();

        let audit = StockAudit::compute(p, &lots, &[]).unwrap();
        assert!(!audit.balanced);
    }

    #[test]
    fn level_uses_only_recent_usage_for_rate() {
        let b = BusinessId::new();
        let p = ProductId::generate();
        let lots = vec![lot(b, p, 60)];
        let usages = vec![usage(b, p, 30, 3), usage(b, p, 50, 45)];

        let level = StockLevel::compute(p, 10, &lots, &usages, now(), 30).unwrap();
        assert_eq!(level.total_used, 80);
        assert_eq!(level.recent_used, 30);
        assert_eq!(level.daily_usage_rate, 1.0);
        assert_eq!(level.days_remaining, Some(60));
        assert!(!level.is_low_stock);
    }

    #[test]
    fn level_without_recent_usage_has_no_horizon() {
        let b = BusinessId::new();
        let p = ProductId::generate();
        let lots = vec![lot(b, p, 5)];

        let level = StockLevel::compute(p, 5, &lots, &[], now(), 30).unwrap();
        assert_eq!(level.days_remaining, None);
        assert!(level.is_low_stock);
    }

    #[test]
    fn window_reaching_past_earliest_date_is_rejected() {
        let p = ProductId::generate();
        let early = DateTime::<Utc>::MIN_UTC + Duration::days(1);

        let err = StockLevel::compute(p, 5, &[], &[], early, 30).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
