//! Reservation booking and lifecycle

pub mod lifecycle;
pub mod policy;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use policy::BookingPolicy;
pub use service::{BookingReceipt, BookingService};
