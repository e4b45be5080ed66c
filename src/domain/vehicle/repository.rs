//! Vehicle lookup interface

use async_trait::async_trait;

use super::model::Vehicle;
use crate::domain::DomainResult;

#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn get_vehicle(&self, vehicle_id: &str) -> DomainResult<Option<Vehicle>>;
}
