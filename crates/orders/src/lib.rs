//! Orders domain module (order lifecycle, manufacturing stages).
//!
//! The `Order` aggregate decides status transitions from an explicit state
//! table and emits events describing both the new state and the stock / ledger
//! side effects infrastructure must carry out in the same unit of work.

pub mod order;
pub mod stage;
pub mod status;

pub use order::{
    GoodsDelivered, ManufacturingStagesOpened, Order, OrderCommand, OrderEvent, OrderId,
    OrderItem, OrderLine, OrderPlaced, OrderSnapshot, PlaceOrder, StageUpdated, StatusChanged,
    StatusHistoryEntry, StockReserved, TransitionOrder, UpdateStage, ORDER_PLACED_NOTE,
};
pub use stage::{ManufacturingStage, StageName, StageStatus};
pub use status::{OrderStatus, SideEffect, TRANSITIONS, side_effects};
