//! Parties domain module (customers and suppliers).
//!
//! Business rules for trading counterparties, implemented purely as
//! deterministic domain logic (no IO, no storage).

pub mod party;

pub use party::{ContactInfo, Counterparty, CounterpartyId, CounterpartyKind, NewCounterparty};
