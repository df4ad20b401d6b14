//! Plain read-only inputs for insight jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockflow_core::BusinessId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSnapshot {
    pub remaining_qty: i64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub quantity: i64,
    pub used_at: DateTime<Utc>,
}

/// A line for this product on some order, stamped with the order's creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    pub quantity: i64,
    pub order_created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub name: String,
    pub unit: String,
    pub reorder_level: i64,
    pub lots: Vec<LotSnapshot>,
    pub usages: Vec<UsageSnapshot>,
    pub order_lines: Vec<OrderLineSnapshot>,
}

impl ProductSnapshot {
    pub fn total_stock(&self) -> i64 {
        self.lots.iter().map(|l| l.remaining_qty).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerKind {
    Purchase,
    Sale,
    StockIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub kind: LedgerKind,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything a business-health pass looks at, products in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessSnapshot {
    pub business_id: BusinessId,
    pub products: Vec<ProductSnapshot>,
    pub ledger: Vec<LedgerSnapshot>,
}
