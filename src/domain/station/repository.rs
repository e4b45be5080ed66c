//! Connector lookup interface

use async_trait::async_trait;

use super::model::Connector;
use crate::domain::DomainResult;

/// Read-only view of the station catalogue.
#[async_trait]
pub trait ConnectorDirectory: Send + Sync {
    async fn get_connector(&self, connector_id: &str) -> DomainResult<Option<Connector>>;
}
