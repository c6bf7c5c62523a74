use thiserror::Error;

use galley_core::{DomainError, MaterialId};

use crate::event_store::EventStoreError;

/// Error returned by the application services.
///
/// Domain rejections pass through unchanged. Only `Concurrency` is ever worth
/// retrying; the unit of work does that itself up to its configured bound.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("event store error: {0}")]
    Store(EventStoreError),

    #[error("failed to decode stored event: {0}")]
    Deserialize(String),
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => ServiceError::Concurrency(msg),
            EventStoreError::Decode(msg) => ServiceError::Deserialize(msg),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Concurrency(_))
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Fill material names into stock shortfalls, leaving other errors alone.
    pub fn with_material_names(self, name_of: impl Fn(MaterialId) -> Option<String>) -> Self {
        match self {
            ServiceError::Domain(e) => ServiceError::Domain(e.with_material_names(name_of)),
            other => other,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_concurrency_is_retryable() {
        let conflict: ServiceError = EventStoreError::Concurrency("stale".to_string()).into();
        assert!(conflict.is_retryable());

        let decode: ServiceError = EventStoreError::Decode("bad json".to_string()).into();
        assert!(matches!(decode, ServiceError::Deserialize(_)));
        assert!(!decode.is_retryable());

        let domain: ServiceError = DomainError::validation("nope").into();
        assert!(!domain.is_retryable());
        assert!(domain.domain().is_some());
    }
}
