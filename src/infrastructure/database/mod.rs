//! SeaORM persistence: entities, migrations and repositories

pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::{
    SeaOrmConnectorDirectory, SeaOrmRepositoryProvider, SeaOrmReservationRepository,
    SeaOrmVehicleDirectory,
};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migrator::Migrator;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./booking.db?mode=rwc")
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./booking.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Create config for SQLite
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            ..Self::default()
        }
    }
}

/// Initialize database connection
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    info!(url = %config.url, "Connecting to database");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections.max(1))
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("Database connected successfully");
    Ok(db)
}

/// Apply pending migrations
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let pending = Migrator::get_pending_migrations(db).await?.len();
    Migrator::up(db, None).await?;
    info!(applied = pending, "Database migrations up to date");
    Ok(())
}

/// Fresh migrated in-memory SQLite database.
///
/// One connection only: every new in-memory connection is a new database.
#[cfg(test)]
pub(crate) async fn test_database() -> DatabaseConnection {
    let db = init_database(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("in-memory database");
    run_migrations(&db).await.expect("migrations");
    db
}
