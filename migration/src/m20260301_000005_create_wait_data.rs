use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::User;
use super::m20260301_000004_create_schedules::{Schedule, ScheduleRoad};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DriverBid::Table)
                    .if_not_exists()
                    .col(pk_auto(DriverBid::Id))
                    .col(integer(DriverBid::DriverId).not_null())
                    .col(integer(DriverBid::ScheduleId).not_null())
                    .col(integer(DriverBid::RoadId).not_null())
                    .col(string_len(DriverBid::Status, 20).not_null())
                    .col(
                        timestamp_with_time_zone(DriverBid::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bid_driver")
                            .from(DriverBid::Table, DriverBid::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bid_schedule")
                            .from(DriverBid::Table, DriverBid::ScheduleId)
                            .to(Schedule::Table, Schedule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bid_road")
                            .from(DriverBid::Table, DriverBid::RoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoadDriver::Table)
                    .if_not_exists()
                    .col(pk_auto(RoadDriver::Id))
                    .col(integer(RoadDriver::RoadId).not_null())
                    .col(integer(RoadDriver::DriverId).not_null())
                    .col(boolean(RoadDriver::IsRepeat).not_null().default(false))
                    .col(boolean(RoadDriver::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(RoadDriver::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_driver_road")
                            .from(RoadDriver::Table, RoadDriver::RoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_driver_driver")
                            .from(RoadDriver::Table, RoadDriver::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoadDriver::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DriverBid::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DriverBid {
    Table,
    Id,
    DriverId,
    ScheduleId,
    RoadId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum RoadDriver {
    Table,
    Id,
    RoadId,
    DriverId,
    IsRepeat,
    Active,
    CreatedAt,
}
