use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockflow_accounting::{LedgerEntry, LedgerEntryDraft, LedgerEntryType};
use stockflow_core::{BusinessId, DomainError, ReferenceCode, execute};
use stockflow_inventory::{AllocationPlan, InventoryLot, ReceiveLot};
use stockflow_orders::{
    GoodsDelivered, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderSnapshot,
    OrderStatus, PlaceOrder, StageName, StageStatus, StatusHistoryEntry, TransitionOrder,
    UpdateStage,
};
use stockflow_parties::CounterpartyId;

use super::Engine;
use super::lots::allocate_in;
use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::store::{EngineStore, EngineTx};

/// Order as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub counterparty_id: CounterpartyId,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_delivery: Option<DateTime<Utc>>,
}

/// Everything a transition wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub order: OrderSnapshot,
    /// Lots received on delivery.
    pub lots: Vec<InventoryLot>,
    /// SALE entries booked on delivery.
    pub ledger_entries: Vec<LedgerEntry>,
    /// Reservations made on acceptance.
    pub allocations: Vec<AllocationPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: OrderSnapshot,
    pub history: Vec<StatusHistoryEntry>,
}

fn clean_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

impl<S: EngineStore> Engine<S> {
    #[instrument(skip(self, ctx, input), fields(business_id = %ctx.business_id, order_id), err)]
    pub async fn place_order(
        &self,
        ctx: &RequestContext,
        input: NewOrder,
    ) -> EngineResult<OrderSnapshot> {
        let mut tx = self.open(ctx).await?;
        let now = self.now();
        let order_id = OrderId::generate();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let mut order = Order::empty(order_id);
        let events = execute(
            &mut order,
            &OrderCommand::PlaceOrder(PlaceOrder {
                business_id: ctx.business_id,
                order_id,
                order_number: ReferenceCode::ORDER.generate(now),
                counterparty_id: input.counterparty_id,
                lines: input.lines,
                notes: clean_note(input.notes.as_deref()),
                expected_delivery: input.expected_delivery,
                occurred_at: now,
            }),
        )?;

        if tx.counterparty(input.counterparty_id).await?.is_none() {
            return Err(DomainError::not_found().into());
        }
        for item in order.items() {
            if tx.product(item.product_id).await?.is_none() {
                return Err(DomainError::not_found().into());
            }
        }

        let snapshot = order
            .snapshot()
            .ok_or_else(|| DomainError::invariant("placed order has no snapshot"))?;
        tx.insert_order(&snapshot).await?;
        for entry in events.iter().filter_map(OrderEvent::history_entry) {
            tx.append_status_history(&entry).await?;
        }
        tx.commit().await?;

        info!(order_number = %snapshot.order_number, total = snapshot.total_amount, "order placed");
        Ok(snapshot)
    }

    /// Move an order to `target` and carry out the side effects of that move.
    ///
    /// Status, history row, stages, reservations, received lots and SALE
    /// entries are written in one unit of work.
    #[instrument(
        skip(self, ctx, note),
        fields(business_id = %ctx.business_id, order_id = %order_id),
        err
    )]
    pub async fn transition(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        target: &str,
        note: Option<&str>,
    ) -> EngineResult<TransitionOutcome> {
        let mut tx = self.open(ctx).await?;
        let target: OrderStatus = target.parse()?;
        let now = self.now();

        let stored = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let expected_version = stored.version;
        let from = stored.status;
        let mut order = Order::from_snapshot(stored);

        let events = execute(
            &mut order,
            &OrderCommand::TransitionOrder(TransitionOrder {
                business_id: ctx.business_id,
                target,
                note: clean_note(note),
                reserve_stock: self.config.reserve_stock_on_accept,
                occurred_at: now,
            }),
        )?;

        let mut lots = Vec::new();
        let mut ledger_entries = Vec::new();
        let mut allocations = Vec::new();

        for event in &events {
            if let Some(entry) = event.history_entry() {
                tx.append_status_history(&entry).await?;
            }
            match event {
                OrderEvent::StockReserved(e) => {
                    let reason = format!("Reserved for order {}", e.order_number);
                    for item in &e.items {
                        let plan =
                            allocate_in(&mut tx, item.product_id, item.quantity, Some(&reason), now)
                                .await?;
                        allocations.push(plan);
                    }
                }
                OrderEvent::GoodsDelivered(e) => {
                    let (received, booked) = receive_delivery(&mut tx, ctx.business_id, e).await?;
                    lots.extend(received);
                    ledger_entries.extend(booked);
                }
                _ => {}
            }
        }

        let snapshot = order
            .snapshot()
            .ok_or_else(|| DomainError::invariant("transitioned order has no snapshot"))?;
        tx.save_order(&snapshot, expected_version).await?;
        tx.commit().await?;

        info!(
            from = %from,
            to = %snapshot.status,
            lots = lots.len(),
            sales = ledger_entries.len(),
            "order transitioned"
        );
        Ok(TransitionOutcome {
            order: snapshot,
            lots,
            ledger_entries,
            allocations,
        })
    }

    /// Advance one manufacturing stage of an order by a single step.
    #[instrument(
        skip(self, ctx, note),
        fields(business_id = %ctx.business_id, order_id = %order_id),
        err
    )]
    pub async fn update_manufacturing_stage(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        stage: &str,
        status: &str,
        note: Option<&str>,
    ) -> EngineResult<OrderSnapshot> {
        let mut tx = self.open(ctx).await?;
        let stage: StageName = stage.parse()?;
        let status: StageStatus = status.parse()?;

        let stored = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let expected_version = stored.version;
        let mut order = Order::from_snapshot(stored);

        execute(
            &mut order,
            &OrderCommand::UpdateStage(UpdateStage {
                business_id: ctx.business_id,
                stage,
                status,
                note: clean_note(note),
                occurred_at: self.now(),
            }),
        )?;

        let snapshot = order
            .snapshot()
            .ok_or_else(|| DomainError::invariant("updated order has no snapshot"))?;
        tx.save_order(&snapshot, expected_version).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Remove an order with its history and stages. Lots and ledger entries it
    /// produced stay.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id, order_id = %order_id), err)]
    pub async fn delete_order(&self, ctx: &RequestContext, order_id: OrderId) -> EngineResult<()> {
        let mut tx = self.open(ctx).await?;
        if !tx.delete_order(order_id).await? {
            return Err(DomainError::not_found().into());
        }
        tx.commit().await?;
        info!("order deleted");
        Ok(())
    }

    pub async fn order(&self, ctx: &RequestContext, order_id: OrderId) -> EngineResult<OrderDetails> {
        let mut tx = self.open(ctx).await?;
        let order = tx.order(order_id).await?.ok_or_else(DomainError::not_found)?;
        let history = tx.status_history(order_id).await?;
        Ok(OrderDetails { order, history })
    }
}

/// One lot and one SALE entry per delivered item.
async fn receive_delivery<T: EngineTx>(
    tx: &mut T,
    business_id: BusinessId,
    delivery: &GoodsDelivered,
) -> EngineResult<(Vec<InventoryLot>, Vec<LedgerEntry>)> {
    let mut lots = Vec::with_capacity(delivery.items.len());
    let mut entries = Vec::with_capacity(delivery.items.len());

    for item in &delivery.items {
        let product = tx
            .product(item.product_id)
            .await?
            .ok_or_else(DomainError::not_found)?;

        let lot = InventoryLot::receive(
            business_id,
            ReceiveLot {
                product_id: item.product_id,
                lot_number: ReferenceCode::LOT.generate(delivery.occurred_at),
                quantity: item.quantity,
                cost_per_unit: item.unit_price,
                received_at: delivery.occurred_at,
                order_id: Some(delivery.order_id),
            },
        )?;

        let draft = LedgerEntryDraft::priced(
            LedgerEntryType::Sale,
            item.quantity,
            item.unit_price,
            format!("Sale of {} via order {}", product.name, delivery.order_number),
        )?
        .with_product(item.product_id)
        .with_order(delivery.order_id)
        .with_counterparty(delivery.counterparty_id);
        let entry = LedgerEntry::post(business_id, draft, delivery.occurred_at)?;

        tx.insert_lot(&lot).await?;
        tx.append_ledger(&entry).await?;
        lots.push(lot);
        entries.push(entry);
    }

    Ok((lots, entries))
}
