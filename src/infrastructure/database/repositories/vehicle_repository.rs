//! SeaORM implementation of VehicleDirectory

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use tracing::{debug, warn};

use crate::domain::station::ConnectorStandard;
use crate::domain::vehicle::{Vehicle, VehicleDirectory};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::vehicle;

pub struct SeaOrmVehicleDirectory {
    db: DatabaseConnection,
}

impl SeaOrmVehicleDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert or replace a vehicle row. Used for seeding.
    pub async fn upsert(&self, v: &Vehicle) -> DomainResult<()> {
        debug!(vehicle_id = %v.id, "Upserting vehicle");

        let existing = vehicle::Entity::find_by_id(v.id.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        match existing {
            Some(model) => {
                let mut active = model.into_active_model();
                active.owner_id = Set(v.owner_id.clone());
                active.label = Set(v.label.clone());
                active.supported_standards = Set(join_standards(&v.supported_standards));
                active.update(&self.db).await.map_err(db_err)?;
            }
            None => {
                vehicle::ActiveModel {
                    id: Set(v.id.clone()),
                    owner_id: Set(v.owner_id.clone()),
                    label: Set(v.label.clone()),
                    supported_standards: Set(join_standards(&v.supported_standards)),
                }
                .insert(&self.db)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }
}

fn join_standards(standards: &[ConnectorStandard]) -> String {
    standards
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_standards(vehicle_id: &str, raw: &str) -> Vec<ConnectorStandard> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let parsed = ConnectorStandard::parse(s);
            if parsed.is_none() {
                warn!(vehicle_id, standard = s, "Ignoring unknown connector standard");
            }
            parsed
        })
        .collect()
}

fn model_to_domain(m: vehicle::Model) -> Vehicle {
    Vehicle {
        supported_standards: split_standards(&m.id, &m.supported_standards),
        id: m.id,
        owner_id: m.owner_id,
        label: m.label,
    }
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::StoreUnavailable(format!("Database error: {}", e))
}

#[async_trait]
impl VehicleDirectory for SeaOrmVehicleDirectory {
    async fn get_vehicle(&self, id: &str) -> DomainResult<Option<Vehicle>> {
        let model = vehicle::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }
}
