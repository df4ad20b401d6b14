use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockflow_accounting::{LedgerEntry, LedgerEntryId};
use stockflow_core::{BusinessId, Quantity};
use stockflow_inventory::{InventoryLot, InventoryUsage, LotId, fifo_sort};
use stockflow_orders::{OrderId, OrderSnapshot, StatusHistoryEntry};
use stockflow_parties::{Counterparty, CounterpartyId};
use stockflow_products::{Product, ProductId};

use super::{EngineStore, EngineTx, LedgerFilter, StoreError};

/// All rows of one business.
#[derive(Debug, Clone, Default)]
struct BusinessTables {
    products: Vec<Product>,
    counterparties: Vec<Counterparty>,
    orders: Vec<OrderSnapshot>,
    history: Vec<StatusHistoryEntry>,
    lots: Vec<InventoryLot>,
    usages: Vec<InventoryUsage>,
    ledger: Vec<LedgerEntry>,
}

/// In-memory engine store.
///
/// Intended for tests/dev. Each business has its own async mutex, held for the
/// whole life of a transaction; writes go to a working copy that replaces the
/// stored tables on commit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    businesses: RwLock<HashMap<BusinessId, Arc<Mutex<BusinessTables>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self, business_id: BusinessId) -> Result<Arc<Mutex<BusinessTables>>, StoreError> {
        {
            let map = self
                .businesses
                .read()
                .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
            if let Some(tables) = map.get(&business_id) {
                return Ok(Arc::clone(tables));
            }
        }
        let mut map = self
            .businesses
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(Arc::clone(map.entry(business_id).or_default()))
    }
}

#[async_trait]
impl EngineStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self, business_id: BusinessId) -> Result<Self::Tx, StoreError> {
        let tables = self.tables(business_id)?;
        let guard = tables.lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx {
            business_id,
            guard,
            working,
        })
    }
}

/// Transaction over one business's tables.
#[derive(Debug)]
pub struct InMemoryTx {
    business_id: BusinessId,
    guard: OwnedMutexGuard<BusinessTables>,
    working: BusinessTables,
}

#[async_trait]
impl EngineTx for InMemoryTx {
    fn business_id(&self) -> BusinessId {
        self.business_id
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if self.working.products.iter().any(|p| p.id == product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        self.working.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let slot = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| StoreError::Conflict(format!("product {} does not exist", product.id)))?;
        *slot = product.clone();
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.iter().find(|p| p.id == id).cloned())
    }

    async fn products(&mut self) -> Result<Vec<Product>, StoreError> {
        Ok(self.working.products.clone())
    }

    async fn insert_counterparty(&mut self, counterparty: &Counterparty) -> Result<(), StoreError> {
        if self.working.counterparties.iter().any(|c| c.id == counterparty.id) {
            return Err(StoreError::Conflict(format!(
                "counterparty {} already exists",
                counterparty.id
            )));
        }
        self.working.counterparties.push(counterparty.clone());
        Ok(())
    }

    async fn counterparty(&mut self, id: CounterpartyId) -> Result<Option<Counterparty>, StoreError> {
        Ok(self.working.counterparties.iter().find(|c| c.id == id).cloned())
    }

    async fn counterparties(&mut self) -> Result<Vec<Counterparty>, StoreError> {
        Ok(self.working.counterparties.clone())
    }

    async fn insert_order(&mut self, order: &OrderSnapshot) -> Result<(), StoreError> {
        if self.working.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        self.working.orders.push(order.clone());
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        Ok(self.working.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        // The business mutex is already held for the whole transaction.
        self.order(id).await
    }

    async fn orders(&mut self) -> Result<Vec<OrderSnapshot>, StoreError> {
        let mut orders = self.working.orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn save_order(
        &mut self,
        order: &OrderSnapshot,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let slot = self
            .working
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| StoreError::Conflict(format!("order {} does not exist", order.id)))?;
        if slot.version != expected_version {
            return Err(StoreError::Conflict(format!(
                "order {} is at version {}, expected {}",
                order.id, slot.version, expected_version
            )));
        }
        *slot = order.clone();
        Ok(())
    }

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> Result<(), StoreError> {
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn status_history(&mut self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        Ok(self
            .working
            .history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let before = self.working.orders.len();
        self.working.orders.retain(|o| o.id != id);
        if self.working.orders.len() == before {
            return Ok(false);
        }
        self.working.history.retain(|h| h.order_id != id);
        Ok(true)
    }

    async fn lots_for_update(&mut self, product_id: ProductId) -> Result<Vec<InventoryLot>, StoreError> {
        let mut lots: Vec<InventoryLot> = self
            .working
            .lots
            .iter()
            .filter(|l| l.product_id == product_id && l.remaining_qty > 0)
            .cloned()
            .collect();
        fifo_sort(&mut lots);
        Ok(lots)
    }

    async fn lots(&mut self) -> Result<Vec<InventoryLot>, StoreError> {
        Ok(self.working.lots.clone())
    }

    async fn insert_lot(&mut self, lot: &InventoryLot) -> Result<(), StoreError> {
        if self.working.lots.iter().any(|l| l.id == lot.id) {
            return Err(StoreError::Conflict(format!("lot {} already exists", lot.lot_number)));
        }
        self.working.lots.push(lot.clone());
        Ok(())
    }

    async fn set_lot_remaining(&mut self, lot_id: LotId, remaining: Quantity) -> Result<(), StoreError> {
        let lot = self
            .working
            .lots
            .iter_mut()
            .find(|l| l.id == lot_id)
            .ok_or_else(|| StoreError::Conflict(format!("lot {lot_id} does not exist")))?;
        lot.remaining_qty = remaining;
        Ok(())
    }

    async fn insert_usage(&mut self, usage: &InventoryUsage) -> Result<(), StoreError> {
        self.working.usages.push(usage.clone());
        Ok(())
    }

    async fn usages(&mut self) -> Result<Vec<InventoryUsage>, StoreError> {
        Ok(self.working.usages.clone())
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if let Some(reversed) = entry.reverses {
            if self.working.ledger.iter().any(|e| e.reverses == Some(reversed)) {
                return Err(StoreError::Conflict(format!(
                    "entry {reversed} already has a reversal"
                )));
            }
        }
        self.working.ledger.push(entry.clone());
        Ok(())
    }

    async fn ledger_entry(&mut self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.working.ledger.iter().find(|e| e.id == id).cloned())
    }

    async fn ledger_entries(&mut self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        // Later appends first among entries sharing a timestamp.
        let mut entries: Vec<LedgerEntry> = self
            .working
            .ledger
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn is_reversed(&mut self, id: LedgerEntryId) -> Result<bool, StoreError> {
        Ok(self.working.ledger.iter().any(|e| e.reverses == Some(id)))
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
