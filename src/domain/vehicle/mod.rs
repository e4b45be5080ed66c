//! Vehicles
//!
//! Owned by the user profile service; read through [`VehicleDirectory`].

pub mod model;
pub mod repository;

pub use model::Vehicle;
pub use repository::VehicleDirectory;
