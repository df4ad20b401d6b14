//! The transactional engine: every mutating operation of the order lifecycle,
//! lot store and ledger.
//!
//! Each call checks the subscription gate, opens one business-scoped
//! [`EngineTx`], runs domain logic against the rows it reads, writes the
//! results and commits. Any error drops the transaction, so nothing partial is
//! ever visible.

mod catalog;
mod ledger;
mod lots;
mod orders;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use stockflow_core::{Clock, SystemClock};
use stockflow_insights::InsightConfig;

use crate::config::{EngineConfig, StockflowConfig};
use crate::context::{AlwaysActive, RequestContext, SubscriptionGate};
use crate::error::{EngineError, EngineResult};
use crate::query::QueryFacade;
use crate::store::{EngineStore, InMemoryStore, PostgresStore, StoreError};

pub use self::lots::Replenishment;
pub use self::orders::{NewOrder, OrderDetails, TransitionOutcome};

pub struct Engine<S: EngineStore> {
    store: Arc<S>,
    gate: Arc<dyn SubscriptionGate>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    insights: InsightConfig,
}

impl<S: EngineStore> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: Arc::clone(&self.gate),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            insights: self.insights.clone(),
        }
    }
}

impl<S: EngineStore> Engine<S> {
    /// Engine with default settings, the wall clock and no billing checks.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            gate: Arc::new(AlwaysActive),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            insights: InsightConfig::default(),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn SubscriptionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: &StockflowConfig) -> Self {
        self.config = config.engine.clone();
        self.insights = config.insights.clone();
        self
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn insight_config(&self) -> &InsightConfig {
        &self.insights
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read-only reporting surface over the same store.
    pub fn query(&self) -> QueryFacade<S> {
        QueryFacade::new(self.clone())
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn authorize(&self, ctx: &RequestContext) -> EngineResult<()> {
        if !self.gate.is_active(ctx.business_id).await {
            warn!(business_id = %ctx.business_id, "rejected call without active subscription");
            return Err(EngineError::SubscriptionRequired);
        }
        Ok(())
    }

    /// Check the gate, then open a unit of work for the caller's business.
    pub(crate) async fn open(&self, ctx: &RequestContext) -> EngineResult<S::Tx> {
        self.authorize(ctx).await?;
        self.begin(ctx).await
    }

    /// Open a unit of work for a caller that already passed the gate.
    pub(crate) async fn begin(&self, ctx: &RequestContext) -> EngineResult<S::Tx> {
        Ok(self.store.begin(ctx.business_id).await?)
    }
}

impl Engine<InMemoryStore> {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}

impl Engine<PostgresStore> {
    /// Connect to `database.url`, make sure the schema exists and apply the
    /// remaining configuration.
    pub async fn connect(config: &StockflowConfig) -> EngineResult<Self> {
        let url = config
            .database
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("database.url is not configured".to_string()))?;
        let store = PostgresStore::connect(url, config.database.max_connections).await?;
        store.ensure_schema().await?;
        Ok(Self::new(Arc::new(store)).with_config(config))
    }
}
