//! Product catalog module.
//!
//! Deterministic domain logic for catalog records (no IO, no storage).

pub mod product;

pub use product::{NewProduct, Product, ProductId, ProductUpdate, DEFAULT_UNIT};
