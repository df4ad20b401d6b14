//! Read-only reporting queries.
//!
//! Every query is scoped to the caller's business and gated on the
//! subscription. Past the gate, a failing query is logged and answers with an
//! empty result instead of an error.

use core::str::FromStr;
use std::collections::HashSet;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockflow_accounting::{LedgerEntry, LedgerEntryType, LedgerSummary};
use stockflow_core::money::checked_sum;
use stockflow_core::{Amount, DomainError, Quantity};
use stockflow_insights::InsightReport;
use stockflow_inventory::{InventoryLot, InventoryUsage, StockLevel};
use stockflow_orders::{ManufacturingStage, OrderId, OrderSnapshot, OrderStatus};
use stockflow_parties::{Counterparty, CounterpartyId};
use stockflow_products::{Product, ProductId};

use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::insights::{business_snapshot, run_business_health};
use crate::store::{EngineStore, EngineTx, LedgerFilter};

/// Orders returned by [`QueryFacade::order_tracking`].
pub const TRACKING_LIMIT: usize = 10;

/// Orders returned in [`Dashboard::recent_orders`].
pub const DASHBOARD_RECENT: usize = 5;

/// Look-back period of a ledger report, ending now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    LastWeek,
    #[default]
    LastMonth,
    LastYear,
}

impl ReportPeriod {
    /// First instant inside the period.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ReportPeriod::LastWeek => now - Duration::days(7),
            ReportPeriod::LastMonth => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
            ReportPeriod::LastYear => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(now - Duration::days(365)),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_lowercase() })
            .collect();
        match normalized.as_str() {
            "last_week" | "week" => Ok(ReportPeriod::LastWeek),
            "last_month" | "month" => Ok(ReportPeriod::LastMonth),
            "last_year" | "year" => Ok(ReportPeriod::LastYear),
            _ => Err(DomainError::validation(format!("unknown report period: {}", s.trim()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Amount,
    pub total: Amount,
}

/// One order with the names a reader needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub items: Vec<TrackedItem>,
    pub total_amount: Amount,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub stages: Vec<ManufacturingStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub name: String,
    pub unit: String,
    pub reorder_level: Quantity,
    pub level: StockLevel,
    /// Lots with stock left, oldest first.
    pub lots: Vec<InventoryLot>,
    /// Usage inside the insight window, newest first.
    pub recent_usage: Vec<InventoryUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHistory {
    pub entry_type: LedgerEntryType,
    pub period: ReportPeriod,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Newest first.
    pub entries: Vec<LedgerEntry>,
    pub summary: LedgerSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyOverview {
    pub counterparty: Counterparty,
    pub order_count: usize,
    pub product_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub total_orders: usize,
    pub active_orders: usize,
    pub total_counterparties: usize,
    pub total_products: usize,
    pub total_stock_units: Quantity,
    /// Σ remaining × cost over all lots.
    pub total_stock_value: Amount,
    pub recent_orders: Vec<TrackedOrder>,
    pub recent_ledger: Vec<LedgerEntry>,
}

pub struct QueryFacade<S: EngineStore> {
    engine: Engine<S>,
}

fn degrade<T>(query: &'static str, result: EngineResult<T>, empty: impl FnOnce() -> T) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(query, %error, "query failed, answering with an empty result");
            empty()
        }
    }
}

/// Ids of counterparties whose name contains `filter`; `None` without a filter.
fn matching_counterparties(
    counterparties: &[Counterparty],
    filter: Option<&str>,
) -> Option<HashSet<CounterpartyId>> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty())?;
    Some(
        counterparties
            .iter()
            .filter(|c| c.name_matches(filter))
            .map(|c| c.id)
            .collect(),
    )
}

fn track(order: &OrderSnapshot, counterparties: &[Counterparty], products: &[Product]) -> TrackedOrder {
    let counterparty_name = counterparties
        .iter()
        .find(|c| c.id == order.counterparty_id)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    let items = order
        .items
        .iter()
        .map(|item| TrackedItem {
            product_id: item.product_id,
            product_name: products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
        })
        .collect();

    TrackedOrder {
        order_id: order.id,
        order_number: order.order_number.clone(),
        status: order.status,
        counterparty_id: order.counterparty_id,
        counterparty_name,
        items,
        total_amount: order.total_amount,
        expected_delivery: order.expected_delivery,
        created_at: order.created_at,
        stages: order.stages.clone(),
    }
}

impl<S: EngineStore> QueryFacade<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// The most recent orders, newest first, optionally only those of
    /// counterparties whose name contains `counterparty_filter`.
    pub async fn order_tracking(
        &self,
        ctx: &RequestContext,
        counterparty_filter: Option<&str>,
    ) -> EngineResult<Vec<TrackedOrder>> {
        self.engine.authorize(ctx).await?;
        Ok(degrade(
            "order_tracking",
            self.load_order_tracking(ctx, counterparty_filter).await,
            Vec::new,
        ))
    }

    async fn load_order_tracking(
        &self,
        ctx: &RequestContext,
        counterparty_filter: Option<&str>,
    ) -> EngineResult<Vec<TrackedOrder>> {
        let mut tx = self.engine.begin(ctx).await?;
        let counterparties = tx.counterparties().await?;
        let wanted = matching_counterparties(&counterparties, counterparty_filter);
        if wanted.as_ref().is_some_and(HashSet::is_empty) {
            debug!("no counterparty matches the filter");
            return Ok(Vec::new());
        }

        let products = tx.products().await?;
        Ok(tx
            .orders()
            .await?
            .iter()
            .filter(|o| wanted.as_ref().is_none_or(|ids| ids.contains(&o.counterparty_id)))
            .take(TRACKING_LIMIT)
            .map(|o| track(o, &counterparties, &products))
            .collect())
    }

    /// Stock position of every product whose name contains `product_filter`.
    pub async fn stock_levels(
        &self,
        ctx: &RequestContext,
        product_filter: Option<&str>,
    ) -> EngineResult<Vec<ProductStock>> {
        self.engine.authorize(ctx).await?;
        Ok(degrade(
            "stock_levels",
            self.load_stock_levels(ctx, product_filter).await,
            Vec::new,
        ))
    }

    async fn load_stock_levels(
        &self,
        ctx: &RequestContext,
        product_filter: Option<&str>,
    ) -> EngineResult<Vec<ProductStock>> {
        let mut tx = self.engine.begin(ctx).await?;
        let products = tx.products().await?;
        let lots = tx.lots().await?;
        let usages = tx.usages().await?;
        let now = self.engine.now();
        let window_days = self.engine.insight_config().window_days;

        let window_start = now
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .ok_or_else(|| DomainError::validation("usage window out of range"))?;

        let filter = product_filter.map(str::trim).filter(|f| !f.is_empty());
        let mut out = Vec::new();
        for product in products
            .iter()
            .filter(|p| filter.is_none_or(|f| p.name_matches(f)))
        {
            let level = StockLevel::compute(
                product.id,
                product.reorder_level,
                &lots,
                &usages,
                now,
                window_days,
            )?;
            let mut open_lots: Vec<InventoryLot> = lots
                .iter()
                .filter(|l| l.product_id == product.id && l.remaining_qty > 0)
                .cloned()
                .collect();
            stockflow_inventory::fifo_sort(&mut open_lots);
            let mut recent_usage: Vec<InventoryUsage> = usages
                .iter()
                .filter(|u| u.product_id == product.id)
                .filter(|u| u.used_at > window_start && u.used_at <= now)
                .cloned()
                .collect();
            recent_usage.sort_by(|a, b| b.used_at.cmp(&a.used_at).then_with(|| b.id.cmp(&a.id)));

            out.push(ProductStock {
                product_id: product.id,
                name: product.name.clone(),
                unit: product.unit.clone(),
                reorder_level: product.reorder_level,
                level,
                lots: open_lots,
                recent_usage,
            });
        }
        Ok(out)
    }

    /// Business-health advisories computed now.
    pub async fn business_insights(&self, ctx: &RequestContext) -> EngineResult<InsightReport> {
        self.engine.authorize(ctx).await?;
        let now = self.engine.now();
        Ok(degrade(
            "business_insights",
            self.load_business_insights(ctx, now).await,
            || InsightReport {
                business_id: ctx.business_id,
                generated_at: now,
                advisories: Vec::new(),
            },
        ))
    }

    async fn load_business_insights(
        &self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> EngineResult<InsightReport> {
        let mut tx = self.engine.begin(ctx).await?;
        let products = tx.products().await?;
        let lots = tx.lots().await?;
        let usages = tx.usages().await?;
        let orders = tx.orders().await?;
        let ledger = tx.ledger_entries(&LedgerFilter::default()).await?;
        drop(tx);

        let snapshot = business_snapshot(ctx.business_id, &products, &lots, &usages, &orders, &ledger);
        Ok(run_business_health(
            ctx.business_id,
            snapshot,
            now,
            self.engine.insight_config(),
        )?)
    }

    /// Entries of one type inside `period`, newest first, with totals.
    pub async fn ledger_history(
        &self,
        ctx: &RequestContext,
        entry_type: LedgerEntryType,
        period: ReportPeriod,
        counterparty_filter: Option<&str>,
    ) -> EngineResult<LedgerHistory> {
        self.engine.authorize(ctx).await?;
        let to = self.engine.now();
        let from = period.start(to);
        Ok(degrade(
            "ledger_history",
            self.load_ledger_history(ctx, entry_type, period, from, to, counterparty_filter)
                .await,
            || LedgerHistory {
                entry_type,
                period,
                from,
                to,
                entries: Vec::new(),
                summary: LedgerSummary::default(),
            },
        ))
    }

    async fn load_ledger_history(
        &self,
        ctx: &RequestContext,
        entry_type: LedgerEntryType,
        period: ReportPeriod,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        counterparty_filter: Option<&str>,
    ) -> EngineResult<LedgerHistory> {
        let mut tx = self.engine.begin(ctx).await?;
        let counterparties = tx.counterparties().await?;

        let mut filter = LedgerFilter::of_type(entry_type).between(from, to);
        let entries = match matching_counterparties(&counterparties, counterparty_filter) {
            Some(ids) if ids.is_empty() => Vec::new(),
            Some(ids) => {
                filter.counterparty_ids = Some(ids.into_iter().collect());
                tx.ledger_entries(&filter).await?
            }
            None => tx.ledger_entries(&filter).await?,
        };
        let summary = LedgerSummary::from_entries(&entries)?;

        Ok(LedgerHistory {
            entry_type,
            period,
            from,
            to,
            entries,
            summary,
        })
    }

    /// Counterparties with how many orders and products reference each.
    pub async fn counterparties(&self, ctx: &RequestContext) -> EngineResult<Vec<CounterpartyOverview>> {
        self.engine.authorize(ctx).await?;
        Ok(degrade(
            "counterparties",
            self.load_counterparties(ctx).await,
            Vec::new,
        ))
    }

    async fn load_counterparties(&self, ctx: &RequestContext) -> EngineResult<Vec<CounterpartyOverview>> {
        let mut tx = self.engine.begin(ctx).await?;
        let counterparties = tx.counterparties().await?;
        let orders = tx.orders().await?;
        let products = tx.products().await?;

        Ok(counterparties
            .into_iter()
            .map(|counterparty| CounterpartyOverview {
                order_count: orders
                    .iter()
                    .filter(|o| o.counterparty_id == counterparty.id)
                    .count(),
                product_count: products
                    .iter()
                    .filter(|p| p.counterparty_id == Some(counterparty.id))
                    .count(),
                counterparty,
            })
            .collect())
    }

    /// Headline numbers for the business.
    pub async fn dashboard(&self, ctx: &RequestContext) -> EngineResult<Dashboard> {
        self.engine.authorize(ctx).await?;
        Ok(degrade(
            "dashboard",
            self.load_dashboard(ctx).await,
            Dashboard::default,
        ))
    }

    async fn load_dashboard(&self, ctx: &RequestContext) -> EngineResult<Dashboard> {
        let mut tx = self.engine.begin(ctx).await?;
        let orders = tx.orders().await?;
        let counterparties = tx.counterparties().await?;
        let products = tx.products().await?;
        let lots = tx.lots().await?;
        let ledger = tx.ledger_entries(&LedgerFilter::default()).await?;

        let total_stock_units = checked_sum(lots.iter().map(|l| l.remaining_qty))?;
        let mut values = Vec::with_capacity(lots.len());
        for lot in &lots {
            values.push(lot.remaining_value()?);
        }
        let total_stock_value = checked_sum(values)?;

        Ok(Dashboard {
            total_orders: orders.len(),
            active_orders: orders.iter().filter(|o| o.status.is_active()).count(),
            total_counterparties: counterparties.len(),
            total_products: products.len(),
            total_stock_units,
            total_stock_value,
            recent_orders: orders
                .iter()
                .take(DASHBOARD_RECENT)
                .map(|o| track(o, &counterparties, &products))
                .collect(),
            recent_ledger: ledger.into_iter().take(DASHBOARD_RECENT).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn periods_parse_loosely() {
        assert_eq!("last week".parse::<ReportPeriod>().unwrap(), ReportPeriod::LastWeek);
        assert_eq!("LAST_MONTH".parse::<ReportPeriod>().unwrap(), ReportPeriod::LastMonth);
        assert_eq!("last-year".parse::<ReportPeriod>().unwrap(), ReportPeriod::LastYear);
        assert!(matches!(
            "fortnight".parse::<ReportPeriod>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn last_month_is_a_calendar_month() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        // Clamped to the last day of February.
        assert_eq!(
            ReportPeriod::LastMonth.start(now),
            Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(ReportPeriod::LastWeek.start(now), now - Duration::days(7));
        assert_eq!(
            ReportPeriod::LastYear.start(now),
            Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap()
        );
    }
}
