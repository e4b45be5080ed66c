//! Reservation aggregate
//!
//! Contains the Reservation entity, its state machine, the check-in
//! credential and the repository interface.

pub mod credential;
pub mod model;
pub mod repository;
pub mod state_machine;

pub use credential::IssuedCredential;
pub use model::{
    BookingRequest, CredentialState, Reservation, ReservationStatus, TransitionRecord,
};
pub use repository::ReservationRepository;
pub use state_machine::{ReservationEvent, Transition};
