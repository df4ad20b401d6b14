use thiserror::Error;

use stockflow_core::DomainError;

use crate::store::StoreError;

/// Failure of an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The business has no active subscription.
    #[error("subscription required")]
    SubscriptionRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller referenced something that does not exist for its business.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Domain(DomainError::NotFound))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
