//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::repositories::RepositoryProvider;
use crate::domain::reservation::ReservationRepository;
use crate::domain::station::ConnectorDirectory;
use crate::domain::vehicle::VehicleDirectory;

use super::connector_repository::SeaOrmConnectorDirectory;
use super::reservation_repository::SeaOrmReservationRepository;
use super::vehicle_repository::SeaOrmVehicleDirectory;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let connector = repos.connectors().get_connector("CN-1").await?;
/// let overdue = repos.reservations().find_overdue_pending(now).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    reservations: SeaOrmReservationRepository,
    connectors: SeaOrmConnectorDirectory,
    vehicles: SeaOrmVehicleDirectory,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            reservations: SeaOrmReservationRepository::new(db.clone()),
            connectors: SeaOrmConnectorDirectory::new(db.clone()),
            vehicles: SeaOrmVehicleDirectory::new(db),
        }
    }

    pub fn connector_directory(&self) -> &SeaOrmConnectorDirectory {
        &self.connectors
    }

    pub fn vehicle_directory(&self) -> &SeaOrmVehicleDirectory {
        &self.vehicles
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn connectors(&self) -> &dyn ConnectorDirectory {
        &self.connectors
    }

    fn vehicles(&self) -> &dyn VehicleDirectory {
        &self.vehicles
    }
}
