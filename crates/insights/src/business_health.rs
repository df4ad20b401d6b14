use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use stockflow_core::BusinessId;

use crate::advisory::{Advisory, AdvisoryKind, InsightError, InsightReport, Severity};
use crate::config::InsightConfig;
use crate::snapshot::{BusinessSnapshot, LedgerKind, ProductSnapshot};

/// Rule-based business-health pass over one business snapshot.
///
/// Windows are anchored at `now`:
/// - current: `(now - window, now]`
/// - prior:   `(now - 2 * window, now - window]`
///
/// Output is stable-sorted by severity; ties keep computation order (products
/// in snapshot order, rules in declaration order, revenue summary last).
#[derive(Debug, Clone)]
pub struct BusinessHealthJob {
    business_id: BusinessId,
    input: BusinessSnapshot,
    now: DateTime<Utc>,
    config: InsightConfig,
}

impl BusinessHealthJob {
    pub fn new(business_id: BusinessId, input: BusinessSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            business_id,
            input,
            now,
            config: InsightConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InsightConfig) -> Self {
        self.config = config;
        self
    }
}

impl BusinessHealthJob {
    /// The business the job was requested for.
    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn input(&self) -> &BusinessSnapshot {
        &self.input
    }

    /// Compute advisories. A snapshot of another business is refused.
    pub fn run(&self) -> Result<InsightReport, InsightError> {
        if self.input.business_id != self.business_id {
            return Err(InsightError::InvalidInput(
                "business_id mismatch between job and snapshot".to_string(),
            ));
        }
        self.config.validate()?;

        let windows = Windows::new(self.now, self.config.window_days)?;
        let mut advisories = Vec::new();

        for product in &self.input.products {
            product_rules(product, &windows, &self.config, &mut advisories);
        }
        if let Some(summary) = revenue_summary(&self.input, &windows, self.config.window_days) {
            advisories.push(summary);
        }

        // sort_by_key is stable
        advisories.sort_by_key(|a| a.severity);

        Ok(InsightReport {
            business_id: self.business_id,
            generated_at: self.now,
            advisories,
        })
    }
}

struct Windows {
    current_start: DateTime<Utc>,
    prior_start: DateTime<Utc>,
    now: DateTime<Utc>,
}

impl Windows {
    fn new(now: DateTime<Utc>, window_days: u32) -> Result<Self, InsightError> {
        let window = Duration::days(i64::from(window_days));
        let current_start = now.checked_sub_signed(window);
        let prior_start = current_start.and_then(|start| start.checked_sub_signed(window));
        match (current_start, prior_start) {
            (Some(current_start), Some(prior_start)) => Ok(Self {
                current_start,
                prior_start,
                now,
            }),
            _ => Err(InsightError::InvalidInput(format!(
                "a {window_days} day window reaches before the earliest representable date"
            ))),
        }
    }

    fn in_current(&self, at: DateTime<Utc>) -> bool {
        at > self.current_start && at <= self.now
    }

    fn in_prior(&self, at: DateTime<Utc>) -> bool {
        at > self.prior_start && at <= self.current_start
    }
}

fn product_rules(
    product: &ProductSnapshot,
    windows: &Windows,
    config: &InsightConfig,
    out: &mut Vec<Advisory>,
) {
    let stock = product.total_stock();
    let has_lots = !product.lots.is_empty();
    let unit = &product.unit;
    let name = &product.name;

    let current_usage: i64 = product
        .usages
        .iter()
        .filter(|u| windows.in_current(u.used_at))
        .map(|u| u.quantity)
        .sum();
    let prior_usage: i64 = product
        .usages
        .iter()
        .filter(|u| windows.in_prior(u.used_at))
        .map(|u| u.quantity)
        .sum();

    let advise = |kind, severity, title: String, message: String| {
        Advisory::new(kind, severity, title, message).for_product(product.product_id)
    };

    if stock > 0 && stock <= product.reorder_level {
        out.push(
            advise(
                AdvisoryKind::LowStock,
                Severity::Warning,
                format!("Low Stock: {name}"),
                format!(
                    "Only {stock} {unit} remaining (reorder level {}). Consider restocking.",
                    product.reorder_level
                ),
            )
            .with_metadata(json!({ "total_stock": stock, "reorder_level": product.reorder_level })),
        );
    }

    if stock == 0 && has_lots {
        out.push(advise(
            AdvisoryKind::OutOfStock,
            Severity::Critical,
            format!("Out of Stock: {name}"),
            format!("{name} is completely out of stock. New orders cannot be fulfilled until it is restocked."),
        ));
    }

    let daily = current_usage as f64 / f64::from(config.window_days);
    if daily > 0.0 && stock > 0 {
        let days = (stock as f64 / daily).round() as i64;
        let metadata = json!({ "daily_usage_rate": daily, "days_remaining": days, "total_stock": stock });
        if days <= config.running_low_days {
            out.push(
                advise(
                    AdvisoryKind::RunningLow,
                    Severity::Critical,
                    format!("Stock Running Low: {name}"),
                    format!("At {daily:.1} {unit}/day, stock will last ~{days} days. Restock now."),
                )
                .with_metadata(metadata),
            );
        } else if days <= config.reorder_soon_days {
            out.push(
                advise(
                    AdvisoryKind::ReorderSoon,
                    Severity::Warning,
                    format!("Reorder Soon: {name}"),
                    format!("At {daily:.1} {unit}/day, stock will last ~{days} days. Plan a restock."),
                )
                .with_metadata(metadata),
            );
        }
    }

    if stock > 0 && current_usage == 0 && has_lots {
        out.push(advise(
            AdvisoryKind::SlowMoving,
            Severity::Info,
            format!("No Movement: {name}"),
            format!(
                "{name} has {stock} {unit} in stock but no usage in the last {} days.",
                config.window_days
            ),
        ));
    }

    let recent_lines: Vec<i64> = product
        .order_lines
        .iter()
        .filter(|l| windows.in_current(l.order_created_at))
        .map(|l| l.quantity)
        .collect();
    if recent_lines.len() >= config.high_demand_order_lines {
        let ordered: i64 = recent_lines.iter().sum();
        out.push(
            advise(
                AdvisoryKind::HighDemand,
                Severity::Info,
                format!("Top Seller: {name}"),
                format!(
                    "{name} appears on {} orders totaling {ordered} {unit} in the last {} days.",
                    recent_lines.len(),
                    config.window_days
                ),
            )
            .with_metadata(json!({ "order_lines": recent_lines.len(), "ordered_quantity": ordered })),
        );
    }

    if current_usage > 0 && prior_usage > 0 {
        let ratio = current_usage as f64 / prior_usage as f64;
        let change_pct = ((ratio - 1.0) * 100.0).round() as i64;
        let metadata = json!({ "current": current_usage, "prior": prior_usage, "ratio": ratio });
        if ratio > config.increase_ratio {
            out.push(
                advise(
                    AdvisoryKind::SalesIncreasing,
                    Severity::Info,
                    format!("Sales Growing: {name}"),
                    format!("Usage of {name} is up {change_pct}% on the previous period."),
                )
                .with_metadata(metadata),
            );
        } else if ratio < config.decline_ratio {
            out.push(
                advise(
                    AdvisoryKind::SalesDeclining,
                    Severity::Warning,
                    format!("Sales Declining: {name}"),
                    format!(
                        "Usage of {name} is down {}% on the previous period. Review pricing or demand.",
                        -change_pct
                    ),
                )
                .with_metadata(metadata),
            );
        }
    }
}

fn revenue_summary(
    snapshot: &BusinessSnapshot,
    windows: &Windows,
    window_days: u32,
) -> Option<Advisory> {
    let mut revenue = 0i64;
    let mut sales = 0usize;
    let mut spend = 0i64;
    let mut purchases = 0usize;

    for entry in snapshot.ledger.iter().filter(|e| windows.in_current(e.created_at)) {
        match entry.kind {
            LedgerKind::Sale => {
                revenue = revenue.saturating_add(entry.total_amount);
                sales += 1;
            }
            LedgerKind::Purchase => {
                spend = spend.saturating_add(entry.total_amount);
                purchases += 1;
            }
            LedgerKind::StockIn => {}
        }
    }

    if sales == 0 && purchases == 0 {
        return None;
    }

    Some(
        Advisory::new(
            AdvisoryKind::RevenueSummary,
            Severity::Info,
            "Revenue Summary",
            format!(
                "Last {window_days} days: revenue {revenue} from {sales} sales, spend {spend} on {purchases} purchases."
            ),
        )
        .with_metadata(json!({
            "revenue": revenue,
            "sales": sales,
            "spend": spend,
            "purchases": purchases,
        })),
    )
}
