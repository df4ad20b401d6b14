use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stockflow_core::BusinessId;

/// Advisory urgency. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvisoryKind {
    LowStock,
    OutOfStock,
    ReorderSoon,
    RunningLow,
    SlowMoving,
    HighDemand,
    SalesIncreasing,
    SalesDeclining,
    RevenueSummary,
}

impl AdvisoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisoryKind::LowStock => "LOW_STOCK",
            AdvisoryKind::OutOfStock => "OUT_OF_STOCK",
            AdvisoryKind::ReorderSoon => "REORDER_SOON",
            AdvisoryKind::RunningLow => "RUNNING_LOW",
            AdvisoryKind::SlowMoving => "SLOW_MOVING",
            AdvisoryKind::HighDemand => "HIGH_DEMAND",
            AdvisoryKind::SalesIncreasing => "SALES_INCREASING",
            AdvisoryKind::SalesDeclining => "SALES_DECLINING",
            AdvisoryKind::RevenueSummary => "REVENUE_SUMMARY",
        }
    }
}

/// One business-health finding.
///
/// Not a domain event: advisories are derived on demand and never stored as
/// facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    #[serde(rename = "type")]
    pub kind: AdvisoryKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    /// Figures behind the advisory (stock, rates, ratios, totals).
    #[serde(default)]
    pub metadata: JsonValue,
}

impl Advisory {
    pub fn new(
        kind: AdvisoryKind,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            severity,
            product_id: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn for_product(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Output of an insight run, most urgent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub business_id: BusinessId,
    pub generated_at: DateTime<Utc>,
    pub advisories: Vec<Advisory>,
}

impl InsightReport {
    pub fn of_kind(&self, kind: AdvisoryKind) -> impl Iterator<Item = &Advisory> {
        self.advisories.iter().filter(move |a| a.kind == kind)
    }
}

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_first() {
        let mut s = vec![Severity::Info, Severity::Critical, Severity::Warning];
        s.sort();
        assert_eq!(s, vec![Severity::Critical, Severity::Warning, Severity::Info]);
    }

    #[test]
    fn advisory_serializes_with_wire_names() {
        let advisory = Advisory::new(AdvisoryKind::LowStock, Severity::Warning, "t", "m");
        let json = serde_json::to_value(&advisory).unwrap();
        assert_eq!(json["type"], "LOW_STOCK");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("product_id").is_none());
    }
}
