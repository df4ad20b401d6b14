//! Inventory domain module (lots, usage, FIFO allocation).
//!
//! Pure, deterministic stock logic. Persistence and locking live in the infra
//! crate, which loads the lots of one product, plans an allocation here, then
//! writes the plan back inside a single unit of work.

pub mod fifo;
pub mod lot;
pub mod stock;
pub mod usage;

pub use fifo::{AllocationPlan, LotDeduction, fifo_sort, plan_allocation};
pub use lot::{InventoryLot, LotId, ReceiveLot};
pub use stock::{StockAudit, StockLevel};
pub use usage::{DEFAULT_USAGE_REASON, InventoryUsage, UsageId};
