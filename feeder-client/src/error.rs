//! Errors surfaced to whoever triggered an intent.

use crate::domain::{DomainError, NotPermitted};
use crate::services::{ErrorClass, ServiceError};
use crate::session::SessionError;

/// Failure of a user intent: login, a create, a cancel, a start or stop.
///
/// Background polls never produce one of these; their failures are logged
/// and the last snapshot is kept.
#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    /// Rejected locally before any call went out
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    NotPermitted(#[from] NotPermitted),

    /// Rejected by the owning service. The text is the service's own.
    #[error("{0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("service unavailable: {0}")]
    Transient(ServiceError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl FeederError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FeederError::Invalid(_) | FeederError::Rejected(_) => ErrorClass::Validation,
            FeederError::NotPermitted(_) | FeederError::Unauthorized(_) => {
                ErrorClass::Authorization
            }
            FeederError::NotFound(_) => ErrorClass::NotFound,
            FeederError::Transient(_) | FeederError::Session(_) => ErrorClass::Transient,
        }
    }
}

impl From<ServiceError> for FeederError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation { message } => FeederError::Rejected(message),
            ServiceError::NotFound { message } => FeederError::NotFound(message),
            ServiceError::Unauthorized { message } => FeederError::Unauthorized(message),
            other => FeederError::Transient(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RideRequestId, RideStatus};

    #[test]
    fn service_errors_keep_their_class() {
        for status in [400, 401, 404, 500] {
            let service = ServiceError::from_status(status, "msg".into());
            let class = service.class();
            assert_eq!(FeederError::from(service).class(), class);
        }
    }

    #[test]
    fn rejection_text_is_verbatim() {
        let err = FeederError::from(ServiceError::Validation {
            message: "{'eta': ['This field is required.']}".into(),
        });
        assert_eq!(err.to_string(), "{'eta': ['This field is required.']}");
    }

    #[test]
    fn local_refusals() {
        let err = FeederError::from(NotPermitted::CancelNotLooking {
            id: RideRequestId(5),
            status: RideStatus::Cancelled,
        });
        assert_eq!(err.class(), ErrorClass::Authorization);

        let err = FeederError::from(DomainError::EmptyEta);
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(err.to_string(), "ETA is required");
    }
}
