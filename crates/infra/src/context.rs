//! Caller identity and the billing collaborator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{BusinessId, Clock, SystemClock, UserId};

/// Who is calling, resolved by the auth layer before the engine is reached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub business_id: BusinessId,
    pub user_id: UserId,
}

impl RequestContext {
    pub fn new(business_id: BusinessId, user_id: UserId) -> Self {
        Self {
            business_id,
            user_id,
        }
    }
}

/// Answers whether a business may use the engine right now.
#[async_trait]
pub trait SubscriptionGate: Send + Sync + 'static {
    async fn is_active(&self, business_id: BusinessId) -> bool;
}

/// Gate that lets every business through.
#[derive(Debug, Default, Copy, Clone)]
pub struct AlwaysActive;

#[async_trait]
impl SubscriptionGate for AlwaysActive {
    async fn is_active(&self, _business_id: BusinessId) -> bool {
        true
    }
}

/// Subscription statuses that grant access.
pub const ACTIVE_SUBSCRIPTION_STATUSES: [&str; 3] = ["created", "authenticated", "active"];

/// Latest known subscription state of a business, as reported by billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let status_ok = ACTIVE_SUBSCRIPTION_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(self.status.trim()));
        let period_ok = self.current_period_end.is_none_or(|end| end >= now);
        status_ok && period_ok
    }
}

/// Gate backed by subscription records pushed in by the billing integration.
///
/// A business without a record is inactive.
pub struct SubscriptionRecordGate {
    records: RwLock<HashMap<BusinessId, SubscriptionRecord>>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionRecordGate {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn upsert(&self, business_id: BusinessId, record: SubscriptionRecord) {
        match self.records.write() {
            Ok(mut records) => {
                records.insert(business_id, record);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(business_id, record);
            }
        }
    }

    fn record(&self, business_id: BusinessId) -> Option<SubscriptionRecord> {
        match self.records.read() {
            Ok(records) => records.get(&business_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&business_id).cloned(),
        }
    }
}

impl Default for SubscriptionRecordGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionGate for SubscriptionRecordGate {
    async fn is_active(&self, business_id: BusinessId) -> bool {
        self.record(business_id)
            .is_some_and(|record| record.is_active_at(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use stockflow_core::FixedClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn record(status: &str, end: Option<DateTime<Utc>>) -> SubscriptionRecord {
        SubscriptionRecord {
            status: status.to_string(),
            current_period_end: end,
        }
    }

    #[test]
    fn only_paying_statuses_are_active() {
        let future = Some(t0() + Duration::days(3));
        assert!(record("active", future).is_active_at(t0()));
        assert!(record("created", future).is_active_at(t0()));
        assert!(record("Authenticated", None).is_active_at(t0()));
        assert!(!record("halted", future).is_active_at(t0()));
        assert!(!record("cancelled", future).is_active_at(t0()));
    }

    #[test]
    fn expired_period_is_inactive() {
        assert!(!record("active", Some(t0() - Duration::seconds(1))).is_active_at(t0()));
    }

    #[tokio::test]
    async fn record_gate_follows_clock_and_records() {
        let clock = Arc::new(FixedClock::new(t0()));
        let gate = SubscriptionRecordGate::with_clock(clock.clone());
        let business_id = BusinessId::new();

        assert!(!gate.is_active(business_id).await);

        gate.upsert(business_id, record("active", Some(t0() + Duration::days(30))));
        assert!(gate.is_active(business_id).await);

        clock.advance(Duration::days(31));
        assert!(!gate.is_active(business_id).await);
        assert!(!gate.is_active(BusinessId::new()).await);
    }
}
