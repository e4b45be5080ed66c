//! Create reservation_transitions table

use sea_orm_migration::prelude::*;

use super::m20250601_000003_create_reservations::Reservations;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReservationTransitions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReservationTransitions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReservationTransitions::ReservationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReservationTransitions::Status)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReservationTransitions::Note).string())
                    .col(
                        ColumnDef::new(ReservationTransitions::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_transitions_reservation")
                            .from(
                                ReservationTransitions::Table,
                                ReservationTransitions::ReservationId,
                            )
                            .to(Reservations::Table, Reservations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_transitions_reservation")
                    .table(ReservationTransitions::Table)
                    .col(ReservationTransitions::ReservationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReservationTransitions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ReservationTransitions {
    Table,
    Id,
    ReservationId,
    Status,
    Note,
    OccurredAt,
}
