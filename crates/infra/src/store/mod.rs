//! Transactional persistence for the engine.
//!
//! Every mutating engine operation opens one [`EngineTx`] for the calling
//! business, does all of its reads and writes through it, then commits. A
//! transaction serializes against other writers of the same business, and
//! dropping it without `commit` discards every write it made.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockflow_accounting::{LedgerEntry, LedgerEntryId, LedgerEntryType};
use stockflow_core::{BusinessId, Quantity};
use stockflow_inventory::{InventoryLot, InventoryUsage, LotId};
use stockflow_orders::{OrderId, OrderSnapshot, StatusHistoryEntry};
use stockflow_parties::{Counterparty, CounterpartyId};
use stockflow_products::{Product, ProductId};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend unavailable or failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A concurrent writer changed the row first (stale version, unique key).
    #[error("store conflict: {0}")]
    Conflict(String),

    /// A stored row could not be turned back into a domain record.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Ledger selection used by reporting queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub entry_type: Option<LedgerEntryType>,
    pub product_id: Option<ProductId>,
    /// Entries of any of these counterparties; `None` means no restriction.
    pub counterparty_ids: Option<Vec<CounterpartyId>>,
    pub order_id: Option<OrderId>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn of_type(entry_type: LedgerEntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.entry_type.is_some_and(|t| t != entry.entry_type) {
            return false;
        }
        if self.product_id.is_some() && self.product_id != entry.product_id {
            return false;
        }
        if self.order_id.is_some() && self.order_id != entry.order_id {
            return false;
        }
        if let Some(ids) = &self.counterparty_ids {
            match entry.counterparty_id {
                Some(id) if ids.contains(&id) => {}
                _ => return false,
            }
        }
        if self.from.is_some_and(|from| entry.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.created_at > to) {
            return false;
        }
        true
    }
}

/// Source of business-scoped transactions.
#[async_trait]
pub trait EngineStore: Send + Sync + 'static {
    type Tx: EngineTx;

    /// Open a unit of work for `business_id`.
    ///
    /// Every read and write made through the returned transaction is confined
    /// to that business.
    async fn begin(&self, business_id: BusinessId) -> Result<Self::Tx, StoreError>;
}

/// One business-scoped unit of work.
#[async_trait]
pub trait EngineTx: Send + Sized {
    fn business_id(&self) -> BusinessId;

    // catalog
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    /// All products, oldest first.
    async fn products(&mut self) -> Result<Vec<Product>, StoreError>;
    async fn insert_counterparty(&mut self, counterparty: &Counterparty) -> Result<(), StoreError>;
    async fn counterparty(&mut self, id: CounterpartyId) -> Result<Option<Counterparty>, StoreError>;
    /// All counterparties, oldest first.
    async fn counterparties(&mut self) -> Result<Vec<Counterparty>, StoreError>;

    // orders
    async fn insert_order(&mut self, order: &OrderSnapshot) -> Result<(), StoreError>;
    async fn order(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError>;
    /// Load an order and hold it against other writers until commit.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError>;
    /// All orders, newest first.
    async fn orders(&mut self) -> Result<Vec<OrderSnapshot>, StoreError>;
    /// Overwrite an order; `Conflict` if its stored version is not `expected_version`.
    async fn save_order(
        &mut self,
        order: &OrderSnapshot,
        expected_version: u64,
    ) -> Result<(), StoreError>;
    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> Result<(), StoreError>;
    /// History rows of one order, oldest first.
    async fn status_history(&mut self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, StoreError>;
    /// Remove an order with its history and stages. `false` if it did not exist.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError>;

    // lots and usage
    /// Lots of one product with stock left, in FIFO order, held until commit.
    async fn lots_for_update(&mut self, product_id: ProductId) -> Result<Vec<InventoryLot>, StoreError>;
    /// Every lot of the business, depleted ones included.
    async fn lots(&mut self) -> Result<Vec<InventoryLot>, StoreError>;
    async fn insert_lot(&mut self, lot: &InventoryLot) -> Result<(), StoreError>;
    async fn set_lot_remaining(&mut self, lot_id: LotId, remaining: Quantity) -> Result<(), StoreError>;
    async fn insert_usage(&mut self, usage: &InventoryUsage) -> Result<(), StoreError>;
    async fn usages(&mut self) -> Result<Vec<InventoryUsage>, StoreError>;

    // ledger
    async fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;
    async fn ledger_entry(&mut self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError>;
    /// Matching entries, newest first.
    async fn ledger_entries(&mut self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError>;
    /// Whether some entry already reverses `id`.
    async fn is_reversed(&mut self, id: LedgerEntryId) -> Result<bool, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
