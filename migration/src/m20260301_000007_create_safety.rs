use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::User;
use super::m20260301_000004_create_schedules::ScheduleRoad;
use super::m20260301_000006_create_orders::Order;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MeetingCode::Table)
                    .if_not_exists()
                    .col(pk_auto(MeetingCode::Id))
                    .col(integer(MeetingCode::DriverId).not_null())
                    .col(integer(MeetingCode::ScheduleRoadId).not_null())
                    .col(integer(MeetingCode::Code).not_null())
                    .col(timestamp_with_time_zone(MeetingCode::IssuedAt).not_null())
                    .col(timestamp_with_time_zone(MeetingCode::ExpiresAt).not_null())
                    .col(boolean(MeetingCode::Used).not_null().default(false))
                    .col(boolean(MeetingCode::Active).not_null().default(true))
                    .col(integer_null(MeetingCode::VerifiedBy))
                    .col(timestamp_with_time_zone_null(MeetingCode::UsedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_code_driver")
                            .from(MeetingCode::Table, MeetingCode::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_code_road")
                            .from(MeetingCode::Table, MeetingCode::ScheduleRoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SosEvent::Table)
                    .if_not_exists()
                    .col(pk_auto(SosEvent::Id))
                    .col(integer(SosEvent::UserId).not_null())
                    .col(integer_null(SosEvent::OrderId))
                    .col(double_null(SosEvent::Lat))
                    .col(double_null(SosEvent::Lon))
                    .col(text_null(SosEvent::Message))
                    .col(string_len(SosEvent::Status, 20).not_null())
                    .col(integer_null(SosEvent::ResolvedBy))
                    .col(timestamp_with_time_zone_null(SosEvent::ResolvedAt))
                    .col(
                        timestamp_with_time_zone(SosEvent::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sos_event_user")
                            .from(SosEvent::Table, SosEvent::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sos_event_order")
                            .from(SosEvent::Table, SosEvent::OrderId)
                            .to(Order::Table, Order::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SosEvent::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MeetingCode::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MeetingCode {
    Table,
    Id,
    DriverId,
    ScheduleRoadId,
    Code,
    IssuedAt,
    ExpiresAt,
    Used,
    Active,
    VerifiedBy,
    UsedAt,
}

#[derive(DeriveIden)]
pub enum SosEvent {
    Table,
    Id,
    UserId,
    OrderId,
    Lat,
    Lon,
    Message,
    Status,
    ResolvedBy,
    ResolvedAt,
    CreatedAt,
}
