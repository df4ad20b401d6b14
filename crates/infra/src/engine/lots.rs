use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Span, info, instrument};

use stockflow_accounting::{LedgerEntry, LedgerEntryDraft, LedgerEntryType};
use stockflow_core::money::ensure_positive;
use stockflow_core::{Amount, DomainError, Quantity, ReferenceCode};
use stockflow_inventory::{
    AllocationPlan, InventoryLot, InventoryUsage, ReceiveLot, StockAudit, plan_allocation,
};
use stockflow_products::ProductId;

use super::Engine;
use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::store::{EngineStore, EngineTx};

/// Rows written by a replenishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replenishment {
    pub lot: InventoryLot,
    pub ledger_entry: LedgerEntry,
}

impl<S: EngineStore> Engine<S> {
    /// Consume `quantity` of a product from its oldest lots first.
    ///
    /// Either every planned deduction and the usage row are written, or (on
    /// `InsufficientStock` or any other failure) nothing is.
    #[instrument(
        skip(self, ctx, reason),
        fields(business_id = %ctx.business_id, product_id = %product_id, lots_touched),
        err
    )]
    pub async fn allocate(
        &self,
        ctx: &RequestContext,
        product_id: ProductId,
        quantity: Quantity,
        reason: Option<&str>,
    ) -> EngineResult<AllocationPlan> {
        let mut tx = self.open(ctx).await?;
        ensure_positive(quantity, "allocation quantity")?;
        if tx.product(product_id).await?.is_none() {
            return Err(DomainError::not_found().into());
        }

        let plan = allocate_in(&mut tx, product_id, quantity, reason, self.now()).await?;
        tx.commit().await?;

        Span::current().record("lots_touched", plan.deductions.len());
        info!("stock allocated");
        Ok(plan)
    }

    /// Receive new stock as one lot and book it as a STOCK_IN entry.
    #[instrument(
        skip(self, ctx, note),
        fields(business_id = %ctx.business_id, product_id = %product_id),
        err
    )]
    pub async fn replenish(
        &self,
        ctx: &RequestContext,
        product_id: ProductId,
        quantity: Quantity,
        cost_per_unit: Amount,
        note: Option<&str>,
    ) -> EngineResult<Replenishment> {
        let mut tx = self.open(ctx).await?;
        let now = self.now();

        let lot = InventoryLot::receive(
            ctx.business_id,
            ReceiveLot {
                product_id,
                lot_number: ReferenceCode::LOT.generate(now),
                quantity,
                cost_per_unit,
                received_at: now,
                order_id: None,
            },
        )?;
        let product = tx.product(product_id).await?.ok_or_else(DomainError::not_found)?;

        let description = match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) => note.to_string(),
            None => format!("Stock in of {} (lot {})", product.name, lot.lot_number),
        };
        let draft =
            LedgerEntryDraft::priced(LedgerEntryType::StockIn, quantity, cost_per_unit, description)?
                .with_product(product_id);
        let ledger_entry = LedgerEntry::post(ctx.business_id, draft, now)?;

        tx.insert_lot(&lot).await?;
        tx.append_ledger(&ledger_entry).await?;
        tx.commit().await?;

        info!(lot_number = %lot.lot_number, "stock replenished");
        Ok(Replenishment { lot, ledger_entry })
    }

    /// Received / consumed / remaining totals of one product.
    pub async fn audit_stock(
        &self,
        ctx: &RequestContext,
        product_id: ProductId,
    ) -> EngineResult<StockAudit> {
        let mut tx = self.open(ctx).await?;
        if tx.product(product_id).await?.is_none() {
            return Err(DomainError::not_found().into());
        }
        let lots = tx.lots().await?;
        let usages = tx.usages().await?;
        Ok(StockAudit::compute(product_id, &lots, &usages)?)
    }
}

/// FIFO-allocate inside an open unit of work: lock the product's lots, plan,
/// apply, write the new remainders and record one usage row.
pub(super) async fn allocate_in<T: EngineTx>(
    tx: &mut T,
    product_id: ProductId,
    quantity: Quantity,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> EngineResult<AllocationPlan> {
    let mut lots = tx.lots_for_update(product_id).await?;
    let plan = plan_allocation(product_id, &lots, quantity)?;
    plan.apply(&mut lots)?;

    for deduction in &plan.deductions {
        tx.set_lot_remaining(deduction.lot_id, deduction.remaining_after)
            .await?;
    }

    let usage = InventoryUsage::record(tx.business_id(), product_id, quantity, reason, now)?;
    tx.insert_usage(&usage).await?;
    Ok(plan)
}
