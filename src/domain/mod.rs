//! Domain layer: entities, state machine, repository traits and events.

pub mod events;
pub mod payment;
pub mod repositories;
pub mod reservation;
pub mod station;
pub mod vehicle;
pub mod window;

pub use payment::{PaymentNotification, PaymentOutcome};
pub use repositories::{DomainResult, RepositoryProvider, SharedRepositories};
pub use reservation::{
    BookingRequest, CredentialState, Reservation, ReservationEvent, ReservationRepository,
    ReservationStatus, TransitionRecord,
};
pub use station::{Connector, ConnectorDirectory, ConnectorPricing, ConnectorStandard};
pub use vehicle::{Vehicle, VehicleDirectory};
pub use window::TimeWindow;

pub use crate::shared::errors::DomainError;
