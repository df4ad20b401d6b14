use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Accepted,
    InManufacturing,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Placed,
        OrderStatus::Accepted,
        OrderStatus::InManufacturing,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::InManufacturing => "IN_MANUFACTURING",
            OrderStatus::Dispatched => "DISPATCHED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders still in flight (neither delivered nor cancelled).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::invalid_status(format!("unknown status: {wanted}")))
    }
}

/// Work a transition triggers besides the status change itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffect {
    /// FIFO-allocate every item (only when stock reservation is enabled).
    ReserveStock,
    /// Create the manufacturing stage rows (skipped if they already exist).
    OpenManufacturingStages,
    /// Receive the delivered goods: one lot and one SALE entry per item.
    ReceiveGoods,
}

/// Valid transitions and their side effects.
///
/// Any `(from, to)` pair missing here is rejected: skips, backward moves,
/// self-transitions and anything out of a terminal state.
pub const TRANSITIONS: &[(OrderStatus, OrderStatus, &[SideEffect])] = &[
    (OrderStatus::Placed, OrderStatus::Accepted, &[SideEffect::ReserveStock]),
    (
        OrderStatus::Accepted,
        OrderStatus::InManufacturing,
        &[SideEffect::OpenManufacturingStages],
    ),
    (OrderStatus::InManufacturing, OrderStatus::Dispatched, &[]),
    (OrderStatus::Dispatched, OrderStatus::Delivered, &[SideEffect::ReceiveGoods]),
    (OrderStatus::Placed, OrderStatus::Cancelled, &[]),
    (OrderStatus::Accepted, OrderStatus::Cancelled, &[]),
    (OrderStatus::InManufacturing, OrderStatus::Cancelled, &[]),
    (OrderStatus::Dispatched, OrderStatus::Cancelled, &[]),
];

/// Look up the side effects of `from -> to`, or fail with `InvalidStatus`.
pub fn side_effects(from: OrderStatus, to: OrderStatus) -> DomainResult<&'static [SideEffect]> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, effects)| *effects)
        .ok_or_else(|| DomainError::invalid_status(format!("cannot move order from {from} to {to}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("in_manufacturing".parse::<OrderStatus>().unwrap(), OrderStatus::InManufacturing);
        assert_eq!(" Delivered ".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!(matches!(
            "SHIPPED".parse::<OrderStatus>(),
            Err(DomainError::InvalidStatus(_))
        ));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for to in OrderStatus::ALL {
                assert!(side_effects(from, to).is_err(), "{from} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn every_non_terminal_state_can_cancel() {
        for from in OrderStatus::ALL.into_iter().filter(OrderStatus::is_active) {
            assert!(side_effects(from, OrderStatus::Cancelled).is_ok());
        }
    }

    #[test]
    fn skips_and_backward_moves_are_rejected() {
        assert!(side_effects(OrderStatus::Placed, OrderStatus::Dispatched).is_err());
        assert!(side_effects(OrderStatus::Dispatched, OrderStatus::Accepted).is_err());
        assert!(side_effects(OrderStatus::Accepted, OrderStatus::Accepted).is_err());
    }

    #[test]
    fn delivery_receives_goods() {
        assert_eq!(
            side_effects(OrderStatus::Dispatched, OrderStatus::Delivered).unwrap(),
            &[SideEffect::ReceiveGoods]
        );
    }
}
