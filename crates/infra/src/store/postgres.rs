//! Postgres-backed engine store.
//!
//! Each [`PgTx`] is one database transaction. Tenant isolation is enforced by
//! filtering every statement on `business_id`; FIFO allocation locks the
//! candidate lots with `SELECT … FOR UPDATE`, and order transitions lock the
//! order row and re-check its version on write.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//! | Column decode | N/A | `Corrupt` |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockflow_accounting::{LedgerEntry, LedgerEntryId};
use stockflow_core::{BusinessId, DomainError, Quantity};
use stockflow_inventory::{InventoryLot, InventoryUsage, LotId, UsageId};
use stockflow_orders::{
    ManufacturingStage, OrderId, OrderItem, OrderSnapshot, StageName, StatusHistoryEntry,
};
use stockflow_parties::{ContactInfo, Counterparty, CounterpartyId};
use stockflow_products::{Product, ProductId};

use super::{EngineStore, EngineTx, LedgerFilter, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the engine tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl EngineStore for PostgresStore {
    type Tx = PgTx;

    #[instrument(skip(self), fields(business_id = %business_id), err)]
    async fn begin(&self, business_id: BusinessId) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgTx { business_id, tx })
    }
}

/// One Postgres transaction scoped to a business. Rolled back on drop.
pub struct PgTx {
    business_id: BusinessId,
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    fn business(&self) -> Uuid {
        *self.business_id.as_uuid()
    }

    async fn load_stages(&mut self, order_id: OrderId) -> Result<Vec<ManufacturingStage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT stage, status, note, updated_at
            FROM manufacturing_stages
            WHERE business_id = $1 AND order_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(self.business())
        .bind(*order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_stages", e))?;

        rows.iter().map(stage_from_row).collect()
    }

    async fn write_stages(&mut self, order: &OrderSnapshot) -> Result<(), StoreError> {
        for stage in &order.stages {
            let position = StageName::ALL
                .iter()
                .position(|s| *s == stage.stage)
                .unwrap_or_default() as i16;
            sqlx::query(
                r#"
                INSERT INTO manufacturing_stages
                    (business_id, order_id, stage, position, status, note, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (order_id, stage)
                DO UPDATE SET
                    status = EXCLUDED.status,
                    note = EXCLUDED.note,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(self.business())
            .bind(*order.id.as_uuid())
            .bind(stage.stage.as_str())
            .bind(position)
            .bind(stage.status.as_str())
            .bind(&stage.note)
            .bind(stage.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("write_stages", e))?;
        }
        Ok(())
    }

    async fn fetch_order(&mut self, id: OrderId, lock: bool) -> Result<Option<OrderSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE business_id = $1 AND id = $2{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(self.business())
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_order", e))?;

        match row {
            Some(row) => Ok(Some(self.order_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn order_from_row(&mut self, row: &PgRow) -> Result<OrderSnapshot, StoreError> {
        let id: Uuid = get(row, "id")?;
        let business_id: Uuid = get(row, "business_id")?;
        let counterparty_id: Uuid = get(row, "counterparty_id")?;
        let status: String = get(row, "status")?;
        let items: Json<Vec<OrderItem>> = get(row, "items")?;
        let version: i64 = get(row, "version")?;
        let order_id = OrderId::from(id);

        Ok(OrderSnapshot {
            id: order_id,
            business_id: BusinessId::from_uuid(business_id),
            order_number: get(row, "order_number")?,
            counterparty_id: CounterpartyId::from(counterparty_id),
            status: parse("status", &status)?,
            items: items.0,
            total_amount: get(row, "total_amount")?,
            notes: get(row, "notes")?,
            expected_delivery: get(row, "expected_delivery")?,
            created_at: get(row, "created_at")?,
            stages: self.load_stages(order_id).await?,
            version: u64::try_from(version)
                .map_err(|_| StoreError::Corrupt(format!("negative order version {version}")))?,
        })
    }
}

const ORDER_COLUMNS: &str = "id, business_id, order_number, counterparty_id, status, items, \
     total_amount, notes, expected_delivery, created_at, version";

const LOT_COLUMNS: &str = "id, business_id, lot_number, product_id, quantity, remaining_qty, \
     cost_per_unit, received_at, order_id";

const LEDGER_COLUMNS: &str = "id, business_id, entry_type, quantity, unit_price, total_amount, \
     description, product_id, order_id, counterparty_id, reverses, created_at";

#[async_trait]
impl EngineTx for PgTx {
    fn business_id(&self) -> BusinessId {
        self.business_id
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, business_id, name, sku, unit, price, reorder_level, counterparty_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(self.business())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.unit)
        .bind(product.price)
        .bind(product.reorder_level)
        .bind(product.counterparty_id.map(|c| *c.as_uuid()))
        .bind(product.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $3, price = $4, reorder_level = $5
            WHERE business_id = $1 AND id = $2
            "#,
        )
        .bind(self.business())
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price)
        .bind(product.reorder_level)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("product {} does not exist", product.id)));
        }
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, business_id, name, sku, unit, price, reorder_level, counterparty_id, created_at
            FROM products
            WHERE business_id = $1 AND id = $2
            "#,
        )
        .bind(self.business())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn products(&mut self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, business_id, name, sku, unit, price, reorder_level, counterparty_id, created_at
            FROM products
            WHERE business_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(self.business())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn insert_counterparty(&mut self, counterparty: &Counterparty) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO counterparties (id, business_id, kind, name, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*counterparty.id.as_uuid())
        .bind(self.business())
        .bind(counterparty.kind.as_str())
        .bind(&counterparty.name)
        .bind(&counterparty.contact.email)
        .bind(&counterparty.contact.phone)
        .bind(counterparty.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_counterparty", e))?;
        Ok(())
    }

    async fn counterparty(&mut self, id: CounterpartyId) -> Result<Option<Counterparty>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, business_id, kind, name, email, phone, created_at
            FROM counterparties
            WHERE business_id = $1 AND id = $2
            "#,
        )
        .bind(self.business())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("counterparty", e))?;

        row.as_ref().map(counterparty_from_row).transpose()
    }

    async fn counterparties(&mut self) -> Result<Vec<Counterparty>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, business_id, kind, name, email, phone, created_at
            FROM counterparties
            WHERE business_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(self.business())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("counterparties", e))?;

        rows.iter().map(counterparty_from_row).collect()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn insert_order(&mut self, order: &OrderSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, business_id, order_number, counterparty_id, status, items,
                 total_amount, notes, expected_delivery, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*order.id.as_uuid())
        .bind(self.business())
        .bind(&order.order_number)
        .bind(*order.counterparty_id.as_uuid())
        .bind(order.status.as_str())
        .bind(Json(&order.items))
        .bind(order.total_amount)
        .bind(&order.notes)
        .bind(order.expected_delivery)
        .bind(order.created_at)
        .bind(order.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        self.write_stages(order).await
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        self.fetch_order(id, false).await
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<OrderSnapshot>, StoreError> {
        self.fetch_order(id, true).await
    }

    async fn orders(&mut self) -> Result<Vec<OrderSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE business_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(self.business())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("orders", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.order_from_row(row).await?);
        }
        Ok(orders)
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    async fn save_order(
        &mut self,
        order: &OrderSnapshot,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, version = $4, notes = $5
            WHERE business_id = $1 AND id = $2 AND version = $6
            "#,
        )
        .bind(self.business())
        .bind(*order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.version as i64)
        .bind(&order.notes)
        .bind(expected_version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "order {} is not at version {}",
                order.id, expected_version
            )));
        }

        self.write_stages(order).await
    }

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (business_id, order_id, status, note, at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.business())
        .bind(*entry.order_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(&entry.note)
        .bind(entry.at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_status_history", e))?;
        Ok(())
    }

    async fn status_history(&mut self, order_id: OrderId) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status, note, at
            FROM order_status_history
            WHERE business_id = $1 AND order_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(self.business())
        .bind(*order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("status_history", e))?;

        rows.iter()
            .map(|row| {
                let status: String = get(row, "status")?;
                Ok(StatusHistoryEntry {
                    order_id,
                    status: parse("status", &status)?,
                    note: get(row, "note")?,
                    at: get(row, "at")?,
                })
            })
            .collect()
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        // History and stages go with the order (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM orders WHERE business_id = $1 AND id = $2")
            .bind(self.business())
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(lot_count), err)]
    async fn lots_for_update(&mut self, product_id: ProductId) -> Result<Vec<InventoryLot>, StoreError> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots \
             WHERE business_id = $1 AND product_id = $2 AND remaining_qty > 0 \
             ORDER BY received_at ASC, id ASC, lot_number ASC \
             FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(self.business())
            .bind(*product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lots_for_update", e))?;

        Span::current().record("lot_count", rows.len());
        rows.iter().map(lot_from_row).collect()
    }

    async fn lots(&mut self) -> Result<Vec<InventoryLot>, StoreError> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots WHERE business_id = $1 \
             ORDER BY received_at ASC, id ASC, lot_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(self.business())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lots", e))?;

        rows.iter().map(lot_from_row).collect()
    }

    async fn insert_lot(&mut self, lot: &InventoryLot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_lots
                (id, business_id, lot_number, product_id, quantity, remaining_qty,
                 cost_per_unit, received_at, order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*lot.id.as_uuid())
        .bind(self.business())
        .bind(&lot.lot_number)
        .bind(*lot.product_id.as_uuid())
        .bind(lot.quantity)
        .bind(lot.remaining_qty)
        .bind(lot.cost_per_unit)
        .bind(lot.received_at)
        .bind(lot.order_id.map(|o| *o.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_lot", e))?;
        Ok(())
    }

    async fn set_lot_remaining(&mut self, lot_id: LotId, remaining: Quantity) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE inventory_lots SET remaining_qty = $3 WHERE business_id = $1 AND id = $2",
        )
        .bind(self.business())
        .bind(*lot_id.as_uuid())
        .bind(remaining)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_lot_remaining", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("lot {lot_id} does not exist")));
        }
        Ok(())
    }

    async fn insert_usage(&mut self, usage: &InventoryUsage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_usage (id, business_id, product_id, quantity, reason, used_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*usage.id.as_uuid())
        .bind(self.business())
        .bind(*usage.product_id.as_uuid())
        .bind(usage.quantity)
        .bind(&usage.reason)
        .bind(usage.used_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_usage", e))?;
        Ok(())
    }

    async fn usages(&mut self) -> Result<Vec<InventoryUsage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, business_id, product_id, quantity, reason, used_at
            FROM inventory_usage
            WHERE business_id = $1
            ORDER BY used_at ASC, id ASC
            "#,
        )
        .bind(self.business())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("usages", e))?;

        rows.iter().map(usage_from_row).collect()
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, business_id, entry_type, quantity, unit_price, total_amount, description,
                 product_id, order_id, counterparty_id, reverses, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(self.business())
        .bind(entry.entry_type.as_str())
        .bind(entry.quantity)
        .bind(entry.unit_price)
        .bind(entry.total_amount)
        .bind(&entry.description)
        .bind(entry.product_id.map(|p| *p.as_uuid()))
        .bind(entry.order_id.map(|o| *o.as_uuid()))
        .bind(entry.counterparty_id.map(|c| *c.as_uuid()))
        .bind(entry.reverses.map(|r| *r.as_uuid()))
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_ledger", e))?;
        Ok(())
    }

    async fn ledger_entry(&mut self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE business_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(self.business())
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ledger_entry", e))?;

        row.as_ref().map(ledger_from_row).transpose()
    }

    async fn ledger_entries(&mut self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entries \
             WHERE business_id = $1 \
               AND ($2::text IS NULL OR entry_type = $2) \
               AND ($3::uuid IS NULL OR product_id = $3) \
               AND ($4::uuid[] IS NULL OR counterparty_id = ANY($4)) \
               AND ($5::uuid IS NULL OR order_id = $5) \
               AND ($6::timestamptz IS NULL OR created_at >= $6) \
               AND ($7::timestamptz IS NULL OR created_at <= $7) \
             ORDER BY created_at DESC, id DESC"
        );
        let counterparty_ids: Option<Vec<Uuid>> = filter
            .counterparty_ids
            .as_ref()
            .map(|ids| ids.iter().map(|c| *c.as_uuid()).collect());

        let rows = sqlx::query(&sql)
            .bind(self.business())
            .bind(filter.entry_type.map(|t| t.as_str()))
            .bind(filter.product_id.map(|p| *p.as_uuid()))
            .bind(counterparty_ids)
            .bind(filter.order_id.map(|o| *o.as_uuid()))
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ledger_entries", e))?;

        rows.iter().map(ledger_from_row).collect()
    }

    async fn is_reversed(&mut self, id: LedgerEntryId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ledger_entries WHERE business_id = $1 AND reverses = $2
            ) AS reversed
            "#,
        )
        .bind(self.business())
        .bind(*id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("is_reversed", e))?;

        get(&row, "reversed")
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")))
}

fn parse<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = DomainError>,
{
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("bad {column} value {value:?}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = get(row, "id")?;
    let business_id: Uuid = get(row, "business_id")?;
    let counterparty_id: Option<Uuid> = get(row, "counterparty_id")?;
    Ok(Product {
        id: ProductId::from(id),
        business_id: BusinessId::from_uuid(business_id),
        name: get(row, "name")?,
        sku: get(row, "sku")?,
        unit: get(row, "unit")?,
        price: get(row, "price")?,
        reorder_level: get(row, "reorder_level")?,
        counterparty_id: counterparty_id.map(CounterpartyId::from),
        created_at: get(row, "created_at")?,
    })
}

fn counterparty_from_row(row: &PgRow) -> Result<Counterparty, StoreError> {
    let id: Uuid = get(row, "id")?;
    let business_id: Uuid = get(row, "business_id")?;
    let kind: String = get(row, "kind")?;
    Ok(Counterparty {
        id: CounterpartyId::from(id),
        business_id: BusinessId::from_uuid(business_id),
        kind: parse("kind", &kind)?,
        name: get(row, "name")?,
        contact: ContactInfo {
            email: get(row, "email")?,
            phone: get(row, "phone")?,
        },
        created_at: get(row, "created_at")?,
    })
}

fn stage_from_row(row: &PgRow) -> Result<ManufacturingStage, StoreError> {
    let stage: String = get(row, "stage")?;
    let status: String = get(row, "status")?;
    let updated_at: DateTime<Utc> = get(row, "updated_at")?;
    Ok(ManufacturingStage {
        stage: parse("stage", &stage)?,
        status: parse("status", &status)?,
        note: get(row, "note")?,
        updated_at,
    })
}

fn lot_from_row(row: &PgRow) -> Result<InventoryLot, StoreError> {
    let id: Uuid = get(row, "id")?;
    let business_id: Uuid = get(row, "business_id")?;
    let product_id: Uuid = get(row, "product_id")?;
    let order_id: Option<Uuid> = get(row, "order_id")?;
    Ok(InventoryLot {
        id: LotId::from(id),
        lot_number: get(row, "lot_number")?,
        business_id: BusinessId::from_uuid(business_id),
        product_id: ProductId::from(product_id),
        quantity: get(row, "quantity")?,
        remaining_qty: get(row, "remaining_qty")?,
        cost_per_unit: get(row, "cost_per_unit")?,
        received_at: get(row, "received_at")?,
        order_id: order_id.map(OrderId::from),
    })
}

fn usage_from_row(row: &PgRow) -> Result<InventoryUsage, StoreError> {
    let id: Uuid = get(row, "id")?;
    let business_id: Uuid = get(row, "business_id")?;
    let product_id: Uuid = get(row, "product_id")?;
    Ok(InventoryUsage {
        id: UsageId::from(id),
        business_id: BusinessId::from_uuid(business_id),
        product_id: ProductId::from(product_id),
        quantity: get(row, "quantity")?,
        reason: get(row, "reason")?,
        used_at: get(row, "used_at")?,
    })
}

fn ledger_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let id: Uuid = get(row, "id")?;
    let business_id: Uuid = get(row, "business_id")?;
    let entry_type: String = get(row, "entry_type")?;
    let product_id: Option<Uuid> = get(row, "product_id")?;
    let order_id: Option<Uuid> = get(row, "order_id")?;
    let counterparty_id: Option<Uuid> = get(row, "counterparty_id")?;
    let reverses: Option<Uuid> = get(row, "reverses")?;
    Ok(LedgerEntry {
        id: LedgerEntryId::from(id),
        business_id: BusinessId::from_uuid(business_id),
        entry_type: parse("entry_type", &entry_type)?,
        quantity: get(row, "quantity")?,
        unit_price: get(row, "unit_price")?,
        total_amount: get(row, "total_amount")?,
        description: get(row, "description")?,
        product_id: product_id.map(ProductId::from),
        order_id: order_id.map(OrderId::from),
        counterparty_id: counterparty_id.map(CounterpartyId::from),
        reverses: reverses.map(LedgerEntryId::from),
        created_at: get(row, "created_at")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation (duplicate id, second reversal)
                Some("23505") => StoreError::Conflict(msg),
                // Serialization failure
                Some("40001") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
