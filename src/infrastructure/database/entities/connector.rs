//! Connector entity
//!
//! Read-only from the booking engine's point of view; station management
//! owns these rows.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "connectors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub station_id: String,

    /// Type1, Type2, CCS1, CCS2, CHAdeMO, GB/T, NACS
    pub standard: String,

    pub max_power_kw: f64,

    /// Prices in the smallest currency unit
    pub price_per_kwh: i64,
    pub price_per_minute: i64,
    pub session_fee: i64,
    pub currency: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
