use thiserror::Error;
use uuid::Uuid;

use crate::domain::reservation::{ReservationEvent, ReservationStatus};
use crate::domain::station::ConnectorStandard;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Invalid window: {0}")]
    WindowInvalid(String),

    #[error("Vehicle {vehicle_id} does not support {standard} connectors")]
    VehicleIncompatible {
        vehicle_id: String,
        standard: ConnectorStandard,
    },

    #[error("Connector {connector_id} is already held for the requested window ({} conflicting)", .conflicts.len())]
    SlotUnavailable {
        connector_id: String,
        conflicts: Vec<Uuid>,
    },

    #[error("Connector not found: {0}")]
    ConnectorNotFound(String),

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("Reservation {reservation_id}: {event} is not allowed in status {from}")]
    InvalidTransition {
        reservation_id: Uuid,
        from: ReservationStatus,
        event: ReservationEvent,
    },

    /// A conditional write found the reservation in a different status
    #[error("Reservation {reservation_id} is {actual}, expected {expected}")]
    StatusConflict {
        reservation_id: Uuid,
        expected: ReservationStatus,
        actual: ReservationStatus,
    },

    #[error("Reservation {reservation_id} starts in {minutes_until_start} min, cancellation is closed")]
    CancellationWindowClosed {
        reservation_id: Uuid,
        minutes_until_start: i64,
    },

    #[error("Reservation {reservation_id} can only be checked in during its window")]
    CheckInOutsideWindow { reservation_id: Uuid },

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Stored data is inconsistent: {0}")]
    DataIntegrity(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DomainError {
    pub fn reservation_not_found(id: Uuid) -> Self {
        DomainError::NotFound {
            entity: "Reservation",
            field: "id",
            value: id.to_string(),
        }
    }

    /// Whether the operation may succeed if retried unchanged.
    ///
    /// Only infrastructure failures qualify; every other variant is a
    /// definitive answer about the current state.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::StoreUnavailable(_))
    }

    /// The reservation is not (or no longer) in a status that allows the
    /// requested change.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidTransition { .. } | DomainError::StatusConflict { .. }
        )
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_errors_are_transient() {
        assert!(DomainError::StoreUnavailable("timeout".into()).is_transient());
        assert!(!DomainError::WindowInvalid("inverted".into()).is_transient());
        assert!(!DomainError::InvalidTransition {
            reservation_id: Uuid::nil(),
            from: ReservationStatus::Expired,
            event: ReservationEvent::PaymentSucceeded,
        }
        .is_transient());
    }

    #[test]
    fn lost_race_counts_as_invalid_transition() {
        let err = DomainError::StatusConflict {
            reservation_id: Uuid::nil(),
            expected: ReservationStatus::Pending,
            actual: ReservationStatus::Confirmed,
        };
        assert!(err.is_invalid_transition());
        assert!(!err.is_transient());
    }

    #[test]
    fn slot_unavailable_message_counts_conflicts() {
        let err = DomainError::SlotUnavailable {
            connector_id: "CP001-1".into(),
            conflicts: vec![Uuid::nil(), Uuid::nil()],
        };
        assert_eq!(
            err.to_string(),
            "Connector CP001-1 is already held for the requested window (2 conflicting)"
        );
    }
}
