use thiserror::Error;

use crate::phases::PhaseTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    InvalidTransition(#[from] PhaseTransitionError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<PhaseTransitionError> for ApplicationError {
    fn from(value: PhaseTransitionError) -> Self {
        Self::Domain(DomainError::InvalidTransition(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show to a member. Domain messages carry no internals, so
    /// bad requests surface them verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The book club is temporarily unavailable. Please retry shortly.".to_owned()
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(domain) => Self::BadRequest {
                message: domain_message(&domain),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

fn domain_message(error: &DomainError) -> String {
    match error {
        DomainError::InvalidTransition(transition) => transition.user_message(),
        DomainError::NotFound { entity, .. } => format!("No {entity} found."),
        DomainError::Validation(message) => format!("That didn't work: {message}."),
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::cycle::CycleId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::phases::PhaseTransitionError;

    #[test]
    fn validation_error_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::Validation(
            "rating must be between 1 and 10 (got 11)".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert!(interface.user_message().contains("between 1 and 10"));
    }

    #[test]
    fn transition_error_surfaces_a_member_readable_message() {
        let interface = ApplicationError::from(PhaseTransitionError::AwaitingCompletion {
            cycle_id: CycleId("cycle-1".to_owned()),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert!(interface.user_message().contains("complete"));
    }

    #[test]
    fn not_found_hides_identifier() {
        let interface =
            ApplicationError::from(DomainError::not_found("active cycle", "cycle-secret"))
                .into_interface("req-3");

        assert_eq!(interface.user_message(), "No active cycle found.");
        assert_eq!(interface.correlation_id(), "req-3");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The book club is temporarily unavailable. Please retry shortly."
        );
    }
}
