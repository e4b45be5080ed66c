//! Connector availability

pub mod index;

pub use index::{AvailabilityIndex, Hold};
