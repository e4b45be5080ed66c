//! SeaORM implementation of ConnectorDirectory

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use tracing::debug;

use crate::domain::station::{Connector, ConnectorDirectory, ConnectorPricing, ConnectorStandard};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::connector;

pub struct SeaOrmConnectorDirectory {
    db: DatabaseConnection,
}

impl SeaOrmConnectorDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert or replace a connector row. Used for seeding.
    pub async fn upsert(&self, c: &Connector) -> DomainResult<()> {
        debug!(connector_id = %c.id, "Upserting connector");

        let existing = connector::Entity::find_by_id(c.id.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        match existing {
            Some(model) => {
                let mut active = model.into_active_model();
                active.station_id = Set(c.station_id.clone());
                active.standard = Set(c.standard.as_str().to_string());
                active.max_power_kw = Set(c.max_power_kw);
                active.price_per_kwh = Set(c.pricing.price_per_kwh);
                active.price_per_minute = Set(c.pricing.price_per_minute);
                active.session_fee = Set(c.pricing.session_fee);
                active.currency = Set(c.pricing.currency.clone());
                active.update(&self.db).await.map_err(db_err)?;
            }
            None => {
                connector::ActiveModel {
                    id: Set(c.id.clone()),
                    station_id: Set(c.station_id.clone()),
                    standard: Set(c.standard.as_str().to_string()),
                    max_power_kw: Set(c.max_power_kw),
                    price_per_kwh: Set(c.pricing.price_per_kwh),
                    price_per_minute: Set(c.pricing.price_per_minute),
                    session_fee: Set(c.pricing.session_fee),
                    currency: Set(c.pricing.currency.clone()),
                }
                .insert(&self.db)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }
}

fn model_to_domain(m: connector::Model) -> DomainResult<Connector> {
    let standard = ConnectorStandard::parse(&m.standard).ok_or_else(|| {
        DomainError::DataIntegrity(format!("connector {}: unknown standard {}", m.id, m.standard))
    })?;

    Ok(Connector {
        id: m.id,
        station_id: m.station_id,
        standard,
        max_power_kw: m.max_power_kw,
        pricing: ConnectorPricing {
            price_per_kwh: m.price_per_kwh,
            price_per_minute: m.price_per_minute,
            session_fee: m.session_fee,
            currency: m.currency,
        },
    })
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::StoreUnavailable(format!("Database error: {}", e))
}

#[async_trait]
impl ConnectorDirectory for SeaOrmConnectorDirectory {
    async fn get_connector(&self, id: &str) -> DomainResult<Option<Connector>> {
        connector::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }
}
