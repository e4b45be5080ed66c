//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to the reservation store and the
//!   read-only connector / vehicle lookups
//! - `DomainResult`: standard result type for domain operations

use std::sync::Arc;

use super::reservation::ReservationRepository;
use super::station::ConnectorDirectory;
use super::vehicle::VehicleDirectory;

pub use crate::shared::errors::DomainResult;

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let connector = repos.connectors().get_connector("CN-1").await?;
///     let held = repos.reservations().find_overlapping("CN-1", &window).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn reservations(&self) -> &dyn ReservationRepository;
    fn connectors(&self) -> &dyn ConnectorDirectory;
    fn vehicles(&self) -> &dyn VehicleDirectory;
}

pub type SharedRepositories = Arc<dyn RepositoryProvider>;
