//! Create connectors table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Connectors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Connectors::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Connectors::StationId).string().not_null())
                    .col(ColumnDef::new(Connectors::Standard).string().not_null())
                    .col(ColumnDef::new(Connectors::MaxPowerKw).double().not_null())
                    .col(
                        ColumnDef::new(Connectors::PricePerKwh)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Connectors::PricePerMinute)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Connectors::SessionFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Connectors::Currency)
                            .string()
                            .not_null()
                            .default("UZS"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_connectors_station")
                    .table(Connectors::Table)
                    .col(Connectors::StationId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Connectors::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Connectors {
    Table,
    Id,
    StationId,
    Standard,
    MaxPowerKw,
    PricePerKwh,
    PricePerMinute,
    SessionFee,
    Currency,
}
