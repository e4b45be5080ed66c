//! Vehicle entity

use crate::domain::station::ConnectorStandard;

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: String,
    /// User that owns the vehicle
    pub owner_id: String,
    pub label: Option<String>,
    pub supported_standards: Vec<ConnectorStandard>,
}

impl Vehicle {
    pub fn supports(&self, standard: ConnectorStandard) -> bool {
        self.supported_standards.contains(&standard)
    }
}
