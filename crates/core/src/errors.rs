use thiserror::Error;

use crate::flows::DraftTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    DraftTransition(#[from] DraftTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Application-level taxonomy. Validation and rate-limit rejections are
/// decided before any state mutation; transient failures are retried by the
/// caller that owns the retry budget; permanent failures are logged and
/// replaced by a generic reply before they reach the user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("input rejected: {reason}")]
    Validation { reason: String },
    #[error("rate limit exceeded for subject {subject}")]
    RateLimited { subject: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient service failure: {0}")]
    Transient(String),
    #[error("permanent service failure: {0}")]
    Permanent(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("too many requests: {message}")]
    TooManyRequests { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::TooManyRequests { .. } => {
                "Too many requests. Please wait a moment before trying again."
            }
            Self::NotFound { .. } => "The requested resource was not found.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::TooManyRequests { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::TooManyRequests { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(_) | ApplicationError::Validation { .. } => Self::BadRequest {
                message: "request validation failed".to_owned(),
                correlation_id: unassigned,
            },
            ApplicationError::RateLimited { .. } => Self::TooManyRequests {
                message: "rate limit exceeded".to_owned(),
                correlation_id: unassigned,
            },
            ApplicationError::NotFound(message) => {
                Self::NotFound { message, correlation_id: unassigned }
            }
            ApplicationError::Transient(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::Permanent(message) | ApplicationError::IllegalState(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, InterfaceError};

    #[test]
    fn validation_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::Validation { reason: "script tag".to_owned() }
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn rate_limit_maps_to_too_many_requests() {
        let interface = ApplicationError::RateLimited { subject: "user1".to_owned() }
            .into_interface("req-2");
        assert!(matches!(interface, InterfaceError::TooManyRequests { .. }));
    }

    #[test]
    fn transient_maps_to_service_unavailable_and_permanent_to_internal() {
        let transient =
            ApplicationError::Transient("vector index timeout".to_owned()).into_interface("req-3");
        assert!(matches!(transient, InterfaceError::ServiceUnavailable { .. }));

        let permanent =
            ApplicationError::Permanent("invalid api key".to_owned()).into_interface("req-4");
        assert!(matches!(permanent, InterfaceError::Internal { .. }));
        assert_eq!(permanent.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn illegal_state_never_leaks_details_to_the_user() {
        let interface = ApplicationError::IllegalState(
            "session registry used before factory was configured".to_owned(),
        )
        .into_interface("req-5");
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
