//! Reservation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservations")]
pub struct Model {
    /// UUID in its hyphenated text form
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,
    pub vehicle_id: String,
    pub station_id: String,
    pub connector_id: String,

    /// Half-open booked window [window_start, window_end)
    pub window_start: DateTimeUtc,
    pub window_end: DateTimeUtc,

    /// PENDING, CONFIRMED, CHECKED_IN, COMPLETED, CANCELED, EXPIRED, NO_SHOW
    pub status: String,

    /// Set only while PENDING
    #[sea_orm(nullable)]
    pub payment_deadline: Option<DateTimeUtc>,

    pub is_paid: bool,

    /// Smallest currency unit
    pub estimated_cost: i64,

    #[sea_orm(nullable)]
    pub actual_cost: Option<i64>,

    pub currency: String,

    /// SHA-256 of the check-in token, hex
    #[sea_orm(unique)]
    pub access_token_hash: String,

    /// INACTIVE, ACTIVE, REVOKED
    pub credential_state: String,

    /// Gateway reference of the payment that moved this reservation
    #[sea_orm(nullable)]
    pub payment_ref: Option<String>,

    #[sea_orm(nullable)]
    pub checked_in_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub charging_started_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reservation_transition::Entity")]
    Transitions,
}

impl Related<super::reservation_transition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transitions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
