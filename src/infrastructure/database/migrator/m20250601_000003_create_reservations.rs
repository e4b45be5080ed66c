//! Create reservations table
//!
//! Connector and vehicle ids are lookups only, no foreign keys: those rows
//! are owned elsewhere and a reservation must outlive them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reservations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reservations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reservations::UserId).string().not_null())
                    .col(ColumnDef::new(Reservations::VehicleId).string().not_null())
                    .col(ColumnDef::new(Reservations::StationId).string().not_null())
                    .col(ColumnDef::new(Reservations::ConnectorId).string().not_null())
                    .col(
                        ColumnDef::new(Reservations::WindowStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::WindowEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::Status)
                            .string()
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(Reservations::PaymentDeadline).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Reservations::IsPaid)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Reservations::EstimatedCost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Reservations::ActualCost).big_integer())
                    .col(ColumnDef::new(Reservations::Currency).string().not_null())
                    .col(
                        ColumnDef::new(Reservations::AccessTokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Reservations::CredentialState)
                            .string()
                            .not_null()
                            .default("INACTIVE"),
                    )
                    .col(ColumnDef::new(Reservations::PaymentRef).string())
                    .col(ColumnDef::new(Reservations::CheckedInAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Reservations::ChargingStartedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Reservations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reservations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Overlap lookups scan one connector's windows by start
        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_connector_window")
                    .table(Reservations::Table)
                    .col(Reservations::ConnectorId)
                    .col(Reservations::WindowStart)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_status")
                    .table(Reservations::Table)
                    .col(Reservations::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_payment_deadline")
                    .table(Reservations::Table)
                    .col(Reservations::PaymentDeadline)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservations_user")
                    .table(Reservations::Table)
                    .col(Reservations::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reservations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Reservations {
    Table,
    Id,
    UserId,
    VehicleId,
    StationId,
    ConnectorId,
    WindowStart,
    WindowEnd,
    Status,
    PaymentDeadline,
    IsPaid,
    EstimatedCost,
    ActualCost,
    Currency,
    AccessTokenHash,
    CredentialState,
    PaymentRef,
    CheckedInAt,
    ChargingStartedAt,
    CreatedAt,
    UpdatedAt,
}
