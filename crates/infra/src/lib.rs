//! `stockflow-infra`: the engine that ties the domain crates to storage.
//!
//! - [`store`]: business-scoped units of work (in-memory and Postgres).
//! - [`engine`]: transactional operations (orders, FIFO lots, ledger).
//! - [`query`]: read-only reporting over the same store.
//! - [`config`]: layered configuration.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod insights;
pub mod query;
pub mod store;


pub use self::config::{DatabaseConfig, EngineConfig, StockflowConfig};
pub use self::context::{AlwaysActive, RequestContext, SubscriptionGate, SubscriptionRecordGate};
pub use self::engine::{Engine, NewOrder, OrderDetails, Replenishment, TransitionOutcome};
pub use self::error::{EngineError, EngineResult};
pub use self::query::{QueryFacade, ReportPeriod};
pub use self::store::{EngineStore, EngineTx, InMemoryStore, LedgerFilter, PostgresStore, StoreError};
