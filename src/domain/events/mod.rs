//! Domain events
//!
//! Event types that represent facts about what happened to reservations.
//! The EventBus implementation lives in `application::events`.

pub mod types;

pub use types::{
    Event, EventMessage, PaymentRejectedEvent, ReservationCreatedEvent,
    ReservationStatusChangedEvent,
};
