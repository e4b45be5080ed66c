//! Reservation transition log entity
//!
//! Append-only: one row per committed status change.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reservation_transitions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub reservation_id: String,

    /// Status entered by this transition
    pub status: String,

    #[sea_orm(nullable)]
    pub note: Option<String>,

    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reservation::Entity",
        from = "Column::ReservationId",
        to = "super::reservation::Column::Id"
    )]
    Reservation,
}

impl Related<super::reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
