use tracing::{info, instrument};

use stockflow_accounting::{LedgerEntry, LedgerEntryDraft, LedgerEntryId, LedgerSummary};
use stockflow_core::DomainError;

use super::Engine;
use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::store::{EngineStore, EngineTx, LedgerFilter};

impl<S: EngineStore> Engine<S> {
    /// Append a PURCHASE / SALE / STOCK_IN entry recorded outside an order flow.
    #[instrument(
        skip(self, ctx, draft),
        fields(business_id = %ctx.business_id, entry_type = %draft.entry_type),
        err
    )]
    pub async fn append_ledger_entry(
        &self,
        ctx: &RequestContext,
        draft: LedgerEntryDraft,
    ) -> EngineResult<LedgerEntry> {
        let mut tx = self.open(ctx).await?;
        let entry = LedgerEntry::post(ctx.business_id, draft, self.now())?;

        if let Some(product_id) = entry.product_id {
            if tx.product(product_id).await?.is_none() {
                return Err(DomainError::not_found().into());
            }
        }
        if let Some(order_id) = entry.order_id {
            if tx.order(order_id).await?.is_none() {
                return Err(DomainError::not_found().into());
            }
        }
        if let Some(counterparty_id) = entry.counterparty_id {
            if tx.counterparty(counterparty_id).await?.is_none() {
                return Err(DomainError::not_found().into());
            }
        }

        tx.append_ledger(&entry).await?;
        tx.commit().await?;
        info!(entry_id = %entry.id, total = entry.total_amount, "ledger entry appended");
        Ok(entry)
    }

    /// Offset an entry with its negation. Each original can be reversed once.
    #[instrument(skip(self, ctx, reason), fields(business_id = %ctx.business_id, entry_id = %entry_id), err)]
    pub async fn reverse_ledger_entry(
        &self,
        ctx: &RequestContext,
        entry_id: LedgerEntryId,
        reason: &str,
    ) -> EngineResult<LedgerEntry> {
        let mut tx = self.open(ctx).await?;
        let original = tx
            .ledger_entry(entry_id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let already_reversed = tx.is_reversed(entry_id).await?;

        let reversal = original.reversal(already_reversed, reason, self.now())?;
        tx.append_ledger(&reversal).await?;
        tx.commit().await?;
        info!(reversal_id = %reversal.id, "ledger entry reversed");
        Ok(reversal)
    }

    /// Entries matching `filter`, newest first.
    pub async fn ledger_entries(
        &self,
        ctx: &RequestContext,
        filter: &LedgerFilter,
    ) -> EngineResult<Vec<LedgerEntry>> {
        let mut tx = self.open(ctx).await?;
        Ok(tx.ledger_entries(filter).await?)
    }

    pub async fn ledger_summary(
        &self,
        ctx: &RequestContext,
        filter: &LedgerFilter,
    ) -> EngineResult<LedgerSummary> {
        let entries = self.ledger_entries(ctx, filter).await?;
        Ok(LedgerSummary::from_entries(&entries)?)
    }
}
