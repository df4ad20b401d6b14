//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, the aggregate contract, an injectable
//! clock and checked money arithmetic.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod money;
pub mod reference;

pub use aggregate::{Aggregate, AggregateRoot, execute};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, BusinessId, UserId};
pub use money::{Amount, Quantity, line_total};
pub use reference::ReferenceCode;
