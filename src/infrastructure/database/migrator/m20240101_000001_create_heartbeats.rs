//! Create heartbeats table

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Heartbeats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Heartbeats::HeartbeatId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Heartbeats::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Heartbeats::CpuUsage).float().not_null())
                    .col(ColumnDef::new(Heartbeats::GpuUsage).float().not_null())
                    .col(ColumnDef::new(Heartbeats::MemoryUsage).float().not_null())
                    .col(ColumnDef::new(Heartbeats::Temperature).float().not_null())
                    .col(ColumnDef::new(Heartbeats::LastInferenceTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Heartbeats::InferenceFps).float().not_null())
                    .col(
                        ColumnDef::new(Heartbeats::InferenceSuccessRate)
                            .float()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Range queries filter on capture time
        manager
            .create_index(
                Index::create()
                    .name("idx_heartbeats_timestamp")
                    .table(Heartbeats::Table)
                    .col(Heartbeats::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Heartbeats::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Heartbeats {
    Table,
    HeartbeatId,
    Timestamp,
    CpuUsage,
    GpuUsage,
    MemoryUsage,
    Temperature,
    LastInferenceTime,
    InferenceFps,
    InferenceSuccessRate,
}
