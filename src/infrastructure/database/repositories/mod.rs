//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod connector_repository;
pub mod repository_provider;
pub mod reservation_repository;
pub mod vehicle_repository;

pub use connector_repository::SeaOrmConnectorDirectory;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use reservation_repository::SeaOrmReservationRepository;
pub use vehicle_repository::SeaOrmVehicleDirectory;
