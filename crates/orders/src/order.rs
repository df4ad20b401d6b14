use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::money::{checked_sum, ensure_positive};
use stockflow_core::{
    Aggregate, AggregateRoot, Amount, BusinessId, DomainError, Quantity, line_total,
};
use stockflow_parties::CounterpartyId;
use stockflow_products::ProductId;

use crate::stage::{ManufacturingStage, StageName, StageStatus};
use crate::status::{OrderStatus, SideEffect, side_effects};

stockflow_core::domain_id!(OrderId, "Order identifier (scoped by the owning business).");

/// History note written for the initial PLACED entry.
pub const ORDER_PLACED_NOTE: &str = "Order placed";

/// Requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: Amount,
}

/// Line snapshot stored on the order. Immutable once placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_price: Amount,
    /// `quantity × unit_price`.
    pub total: Amount,
}

/// One row of an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Persisted shape of an order (what stores read and write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub business_id: BusinessId,
    pub order_number: String,
    pub counterparty_id: CounterpartyId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_amount: Amount,
    pub notes: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub stages: Vec<ManufacturingStage>,
    pub version: u64,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    business_id: Option<BusinessId>,
    order_number: String,
    counterparty_id: Option<CounterpartyId>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_amount: Amount,
    notes: Option<String>,
    expected_delivery: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    stages: Vec<ManufacturingStage>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            business_id: None,
            order_number: String::new(),
            counterparty_id: None,
            status: OrderStatus::Placed,
            items: Vec::new(),
            total_amount: 0,
            notes: None,
            expected_delivery: None,
            created_at: None,
            stages: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Rebuild the aggregate from its stored shape.
    pub fn from_snapshot(s: OrderSnapshot) -> Self {
        Self {
            id: s.id,
            business_id: Some(s.business_id),
            order_number: s.order_number,
            counterparty_id: Some(s.counterparty_id),
            status: s.status,
            items: s.items,
            total_amount: s.total_amount,
            notes: s.notes,
            expected_delivery: s.expected_delivery,
            created_at: Some(s.created_at),
            stages: s.stages,
            version: s.version,
            created: true,
        }
    }

    /// Stored shape of the order; `None` until it has been placed.
    pub fn snapshot(&self) -> Option<OrderSnapshot> {
        if !self.created {
            return None;
        }
        Some(OrderSnapshot {
            id: self.id,
            business_id: self.business_id?,
            order_number: self.order_number.clone(),
            counterparty_id: self.counterparty_id?,
            status: self.status,
            items: self.items.clone(),
            total_amount: self.total_amount,
            notes: self.notes.clone(),
            expected_delivery: self.expected_delivery,
            created_at: self.created_at?,
            stages: self.stages.clone(),
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn business_id(&self) -> Option<BusinessId> {
        self.business_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn counterparty_id(&self) -> Option<CounterpartyId> {
        self.counterparty_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn stages(&self) -> &[ManufacturingStage] {
        &self.stages
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub order_number: String,
    pub counterparty_id: CounterpartyId,
    pub lines: Vec<OrderLine>,
    pub notes: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOrder {
    pub business_id: BusinessId,
    pub target: OrderStatus,
    pub note: Option<String>,
    /// Honour the `ReserveStock` side effect (configuration driven).
    pub reserve_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStage {
    pub business_id: BusinessId,
    pub stage: StageName,
    pub status: StageStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    TransitionOrder(TransitionOrder),
    UpdateStage(UpdateStage),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub order_number: String,
    pub counterparty_id: CounterpartyId,
    pub items: Vec<OrderItem>,
    pub total_amount: Amount,
    pub notes: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved (items must be FIFO-allocated in the same unit of work).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ManufacturingStagesOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturingStagesOpened {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub stages: Vec<StageName>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsDelivered (items must be received into stock and booked as sales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsDelivered {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub order_number: String,
    pub counterparty_id: CounterpartyId,
    pub items: Vec<OrderItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StageUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdated {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub stage: StageName,
    pub from: StageStatus,
    pub to: StageStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(StatusChanged),
    StockReserved(StockReserved),
    ManufacturingStagesOpened(ManufacturingStagesOpened),
    GoodsDelivered(GoodsDelivered),
    StageUpdated(StageUpdated),
}

impl OrderEvent {
    /// Status history row this event contributes, if any.
    pub fn history_entry(&self) -> Option<StatusHistoryEntry> {
        match self {
            OrderEvent::OrderPlaced(e) => Some(StatusHistoryEntry {
                order_id: e.order_id,
                status: OrderStatus::Placed,
                note: Some(ORDER_PLACED_NOTE.to_string()),
                at: e.occurred_at,
            }),
            OrderEvent::StatusChanged(e) => Some(StatusHistoryEntry {
                order_id: e.order_id,
                status: e.to,
                note: e.note.clone(),
                at: e.occurred_at,
            }),
            _ => None,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.business_id = Some(e.business_id);
                self.order_number = e.order_number.clone();
                self.counterparty_id = Some(e.counterparty_id);
                self.status = OrderStatus::Placed;
                self.items = e.items.clone();
                self.total_amount = e.total_amount;
                self.notes = e.notes.clone();
                self.expected_delivery = e.expected_delivery;
                self.created_at = Some(e.occurred_at);
                self.stages.clear();
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::StockReserved(_) | OrderEvent::GoodsDelivered(_) => {}
            OrderEvent::ManufacturingStagesOpened(e) => {
                self.stages = e
                    .stages
                    .iter()
                    .map(|stage| ManufacturingStage::pending(*stage, e.occurred_at))
                    .collect();
            }
            OrderEvent::StageUpdated(e) => {
                if let Some(stage) = self.stages.iter_mut().find(|s| s.stage == e.stage) {
                    stage.status = e.to;
                    stage.note = e.note.clone();
                    stage.updated_at = e.occurred_at;
                }
            }
        }

        // +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::TransitionOrder(cmd) => self.handle_transition(cmd),
            OrderCommand::UpdateStage(cmd) => self.handle_update_stage(cmd),
        }
    }
}

impl Order {
    /// Orders of another business are reported as absent.
    fn ensure_business(&self, business_id: BusinessId) -> Result<(), DomainError> {
        if !self.created || self.business_id != Some(business_id) {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }

        let mut items = Vec::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            ensure_positive(line.quantity, "item quantity")?;
            if line.unit_price < 0 {
                return Err(DomainError::validation("unit_price cannot be negative"));
            }
            items.push(OrderItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                total: line_total(line.quantity, line.unit_price)?,
            });
        }
        let total_amount = checked_sum(items.iter().map(|i| i.total))?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            business_id: cmd.business_id,
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            counterparty_id: cmd.counterparty_id,
            items,
            total_amount,
            notes: cmd.notes.clone(),
            expected_delivery: cmd.expected_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(&self, cmd: &TransitionOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_business(cmd.business_id)?;
        let effects = side_effects(self.status, cmd.target)?;

        let mut events = vec![OrderEvent::StatusChanged(StatusChanged {
            business_id: cmd.business_id,
            order_id: self.id,
            from: self.status,
            to: cmd.target,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })];

        for effect in effects {
            match effect {
                SideEffect::ReserveStock => {
                    if cmd.reserve_stock {
                        events.push(OrderEvent::StockReserved(StockReserved {
                            business_id: cmd.business_id,
                            order_id: self.id,
                            order_number: self.order_number.clone(),
                            items: self.items.clone(),
                            occurred_at: cmd.occurred_at,
                        }));
                    }
                }
                SideEffect::OpenManufacturingStages => {
                    if self.stages.is_empty() {
                        events.push(OrderEvent::ManufacturingStagesOpened(
                            ManufacturingStagesOpened {
                                business_id: cmd.business_id,
                                order_id: self.id,
                                stages: StageName::ALL.to_vec(),
                                occurred_at: cmd.occurred_at,
                            },
                        ));
                    }
                }
                SideEffect::ReceiveGoods => {
                    let counterparty_id = self
                        .counterparty_id
                        .ok_or_else(|| DomainError::invariant("order has no counterparty"))?;
                    events.push(OrderEvent::GoodsDelivered(GoodsDelivered {
                        business_id: cmd.business_id,
                        order_id: self.id,
                        order_number: self.order_number.clone(),
                        counterparty_id,
                        items: self.items.clone(),
                        occurred_at: cmd.occurred_at,
                    }));
                }
            }
        }

        Ok(events)
    }

    fn handle_update_stage(&self, cmd: &UpdateStage) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_business(cmd.business_id)?;
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invalid_status(
                "cannot update manufacturing stages of a cancelled order",
            ));
        }

        let stage = self
            .stages
            .iter()
            .find(|s| s.stage == cmd.stage)
            .ok_or_else(DomainError::not_found)?;
        stage.check_advance(cmd.status)?;

        Ok(vec![OrderEvent::StageUpdated(StageUpdated {
            business_id: cmd.business_id,
            order_id: self.id,
            stage: cmd.stage,
            from: stage.status,
            to: cmd.status,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stockflow_core::execute;

    fn test_business_id() -> BusinessId {
        BusinessId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn place(business_id: BusinessId, lines: Vec<OrderLine>) -> Order {
        let order_id = OrderId::generate();
        let mut order = Order::empty(order_id);
        let cmd = PlaceOrder {
            business_id,
            order_id,
            order_number: "PO-TEST-0001".to_string(),
            counterparty_id: CounterpartyId::generate(),
            lines,
            notes: None,
            expected_delivery: None,
            occurred_at: test_time(),
        };
        execute(&mut order, &OrderCommand::PlaceOrder(cmd)).unwrap();
        order
    }

    fn line(quantity: Quantity, unit_price: Amount) -> OrderLine {
        OrderLine {
            product_id: ProductId::generate(),
            quantity,
            unit_price,
        }
    }

    fn transition(
        order: &mut Order,
        business_id: BusinessId,
        target: OrderStatus,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        execute(
            order,
            &OrderCommand::TransitionOrder(TransitionOrder {
                business_id,
                target,
                note: None,
                reserve_stock: false,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn place_order_computes_line_and_order_totals() {
        let b = test_business_id();
        let order = place(b, vec![line(20, 15), line(3, 100)]);

        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.items()[0].total, 300);
        assert_eq!(order.total_amount(), 600);
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn placed_event_writes_initial_history_row() {
        let order_id = OrderId::generate();
        let order = Order::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                business_id: test_business_id(),
                order_id,
                order_number: "PO-1".to_string(),
                counterparty_id: CounterpartyId::generate(),
                lines: vec![line(1, 1)],
                notes: None,
                expected_delivery: None,
                occurred_at: test_time(),
            }))
            .unwrap();

        let entry = events[0].history_entry().unwrap();
        assert_eq!(entry.status, OrderStatus::Placed);
        assert_eq!(entry.note.as_deref(), Some(ORDER_PLACED_NOTE));
    }

    #[test]
    fn order_without_items_is_rejected() {
        let order_id = OrderId::generate();
        let order = Order::empty(order_id);
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                business_id: test_business_id(),
                order_id,
                order_number: "PO-1".to_string(),
                counterparty_id: CounterpartyId::generate(),
                lines: vec![],
                notes: None,
                expected_delivery: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_line_is_invalid_quantity() {
        let order_id = OrderId::generate();
        let order = Order::empty(order_id);
        let err = order
            .handle(&OrderCommand::PlaceOrder(PlaceOrder {
                business_id: test_business_id(),
                order_id,
                order_number: "PO-1".to_string(),
                counterparty_id: CounterpartyId::generate(),
                lines: vec![line(5, 10), line(0, 10)],
                notes: None,
                expected_delivery: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn full_lifecycle_emits_side_effects() {
        let b = test_business_id();
        let mut order = place(b, vec![line(20, 15)]);

        let events = transition(&mut order, b, OrderStatus::Accepted).unwrap();
        assert_eq!(events.len(), 1);

        let events = transition(&mut order, b, OrderStatus::InManufacturing).unwrap();
        assert!(matches!(events[1], OrderEvent::ManufacturingStagesOpened(_)));
        assert_eq!(order.stages().len(), 4);
        assert!(order.stages().iter().all(|s| s.status == StageStatus::Pending));

        transition(&mut order, b, OrderStatus::Dispatched).unwrap();

        let events = transition(&mut order, b, OrderStatus::Delivered).unwrap();
        match &events[1] {
            OrderEvent::GoodsDelivered(e) => {
                assert_eq!(e.items.len(), 1);
                assert_eq!(e.items[0].total, 300);
            }
            other => panic!("expected GoodsDelivered, got {other:?}"),
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn delivered_order_cannot_go_back() {
        let b = test_business_id();
        let mut order = place(b, vec![line(1, 1)]);
        for target in [
            OrderStatus::Accepted,
            OrderStatus::InManufacturing,
            OrderStatus::Dispatched,
            OrderStatus::Delivered,
        ] {
            transition(&mut order, b, target).unwrap();
        }
        let version = order.version();

        let err = transition(&mut order, b, OrderStatus::Accepted).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus(_)));
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.version(), version);
    }

    #[test]
    fn reservation_is_only_emitted_when_requested() {
        let b = test_business_id();
        let mut order = place(b, vec![line(2, 5)]);
        let events = execute(
            &mut order,
            &OrderCommand::TransitionOrder(TransitionOrder {
                business_id: b,
                target: OrderStatus::Accepted,
                note: Some("confirmed by phone".to_string()),
                reserve_stock: true,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], OrderEvent::StockReserved(_)));
        assert_eq!(
            events[0].history_entry().unwrap().note.as_deref(),
            Some("confirmed by phone")
        );
    }

    #[test]
    fn other_business_sees_not_found() {
        let mut order = place(test_business_id(), vec![line(1, 1)]);
        let err = transition(&mut order, test_business_id(), OrderStatus::Accepted).unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn stage_updates_move_forward_one_step() {
        let b = test_business_id();
        let mut order = place(b, vec![line(1, 1)]);
        transition(&mut order, b, OrderStatus::Accepted).unwrap();
        transition(&mut order, b, OrderStatus::InManufacturing).unwrap();

        let update = |status| {
            OrderCommand::UpdateStage(UpdateStage {
                business_id: b,
                stage: StageName::Assembly,
                status,
                note: Some("line 2".to_string()),
                occurred_at: test_time(),
            })
        };

        let err = execute(&mut order, &update(StageStatus::Completed)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatus(_)));

        execute(&mut order, &update(StageStatus::InProgress)).unwrap();
        execute(&mut order, &update(StageStatus::Completed)).unwrap();

        let assembly = order
            .stages()
            .iter()
            .find(|s| s.stage == StageName::Assembly)
            .unwrap();
        assert_eq!(assembly.status, StageStatus::Completed);
        assert_eq!(assembly.note.as_deref(), Some("line 2"));
    }

    #[test]
    fn stage_update_before_manufacturing_is_not_found() {
        let b = test_business_id();
        let mut order = place(b, vec![line(1, 1)]);
        let err = execute(
            &mut order,
            &OrderCommand::UpdateStage(UpdateStage {
                business_id: b,
                stage: StageName::Packaging,
                status: StageStatus::InProgress,
                note: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let b = test_business_id();
        let mut order = place(b, vec![line(4, 25)]);
        transition(&mut order, b, OrderStatus::Accepted).unwrap();

        let snapshot = order.snapshot().unwrap();
        let restored = Order::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot().unwrap(), snapshot);
        assert_eq!(restored.version(), 2);
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of targets is requested, the order only
        /// ever follows the state table and never leaves a terminal state.
        #[test]
        fn status_follows_state_table(targets in prop::collection::vec(any_status(), 1..12)) {
            let b = test_business_id();
            let mut order = place(b, vec![line(1, 10)]);

            for target in targets {
                let before = order.status();
                match transition(&mut order, b, target) {
                    Ok(_) => {
                        prop_assert!(side_effects(before, target).is_ok());
                        prop_assert!(!before.is_terminal());
                        prop_assert_eq!(order.status(), target);
                    }
                    Err(DomainError::InvalidStatus(_)) => {
                        prop_assert_eq!(order.status(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
        }
    }
}
