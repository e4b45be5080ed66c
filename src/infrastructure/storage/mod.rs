//! In-memory repositories

mod memory;

pub use memory::{
    InMemoryConnectorDirectory, InMemoryRepositoryProvider, InMemoryReservationRepository,
    InMemoryVehicleDirectory,
};
