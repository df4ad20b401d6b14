//! `stockflow-insights`
//!
//! **Responsibility:** business-health advisories computed from a read-only
//! snapshot.
//!
//! This crate is deliberately outside the domain model:
//! - It does not depend on domain aggregates (products/orders/etc); callers
//!   map their records into the plain snapshot types defined here.
//! - It never mutates domain state.
//! - It emits **advisories**, not domain events.

pub mod advisory;
pub mod business_health;
pub mod config;
pub mod snapshot;

pub use advisory::{Advisory, AdvisoryKind, InsightError, InsightReport, Severity};
pub use business_health::BusinessHealthJob;
pub use config::{InsightConfig, MAX_WINDOW_DAYS};
pub use snapshot::{
    BusinessSnapshot, LedgerKind, LedgerSnapshot, LotSnapshot, OrderLineSnapshot,
    ProductSnapshot, UsageSnapshot,
};
