//! Database entities module

pub mod connector;
pub mod reservation;
pub mod reservation_transition;
pub mod vehicle;

pub use connector::Entity as Connector;
pub use reservation::Entity as Reservation;
pub use reservation_transition::Entity as ReservationTransition;
pub use vehicle::Entity as Vehicle;
