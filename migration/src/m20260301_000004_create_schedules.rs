use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::User;
use super::m20260301_000002_create_family::Child;
use super::m20260301_000003_create_admin::{OtherParameter, Tariff};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Schedule::Table)
                    .if_not_exists()
                    .col(pk_auto(Schedule::Id))
                    .col(integer(Schedule::ParentId).not_null())
                    .col(string_len(Schedule::Title, 200).not_null())
                    .col(text_null(Schedule::Description))
                    .col(integer(Schedule::DurationDays).not_null())
                    .col(integer(Schedule::ChildrenCount).not_null())
                    .col(integer(Schedule::TariffId).not_null())
                    // ";"-joined weekday numbers, e.g. "0;2;4"
                    .col(string_len(Schedule::WeekDays, 32).not_null())
                    .col(string_len(Schedule::Status, 20).not_null())
                    .col(
                        timestamp_with_time_zone(Schedule::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedule_parent")
                            .from(Schedule::Table, Schedule::ParentId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedule_tariff")
                            .from(Schedule::Table, Schedule::TariffId)
                            .to(Tariff::Table, Tariff::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduleRoad::Table)
                    .if_not_exists()
                    .col(pk_auto(ScheduleRoad::Id))
                    .col(integer(ScheduleRoad::ScheduleId).not_null())
                    .col(small_integer(ScheduleRoad::WeekDay).not_null())
                    .col(string_len(ScheduleRoad::StartTime, 5).not_null())
                    .col(string_len(ScheduleRoad::EndTime, 5).not_null())
                    .col(string_len(ScheduleRoad::TypeDrive, 20).not_null())
                    .col(decimal_len(ScheduleRoad::Amount, 12, 2).not_null())
                    .col(boolean(ScheduleRoad::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_schedule")
                            .from(ScheduleRoad::Table, ScheduleRoad::ScheduleId)
                            .to(Schedule::Table, Schedule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoadAddress::Table)
                    .if_not_exists()
                    .col(pk_auto(RoadAddress::Id))
                    .col(integer(RoadAddress::RoadId).not_null())
                    .col(string_len(RoadAddress::AddressFrom, 512).not_null())
                    .col(string_len(RoadAddress::AddressTo, 512).not_null())
                    .col(double(RoadAddress::FromLat).not_null())
                    .col(double(RoadAddress::FromLon).not_null())
                    .col(double(RoadAddress::ToLat).not_null())
                    .col(double(RoadAddress::ToLon).not_null())
                    .col(integer_null(RoadAddress::DistanceM))
                    .col(integer_null(RoadAddress::DurationS))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_address_road")
                            .from(RoadAddress::Table, RoadAddress::RoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoadChild::Table)
                    .if_not_exists()
                    .col(pk_auto(RoadChild::Id))
                    .col(integer(RoadChild::RoadId).not_null())
                    .col(integer(RoadChild::ChildId).not_null())
                    .col(boolean(RoadChild::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_child_road")
                            .from(RoadChild::Table, RoadChild::RoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_child_child")
                            .from(RoadChild::Table, RoadChild::ChildId)
                            .to(Child::Table, Child::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoadContact::Table)
                    .if_not_exists()
                    .col(pk_auto(RoadContact::Id))
                    .col(integer(RoadContact::RoadId).not_null())
                    .col(string_len(RoadContact::Surname, 100).not_null())
                    .col(string_len(RoadContact::Name, 100).not_null())
                    .col(string_len_null(RoadContact::Patronymic, 100))
                    .col(string_len(RoadContact::Phone, 20).not_null())
                    .col(boolean(RoadContact::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_road_contact_road")
                            .from(RoadContact::Table, RoadContact::RoadId)
                            .to(ScheduleRoad::Table, ScheduleRoad::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ScheduleOtherParameter::Table)
                    .if_not_exists()
                    .col(pk_auto(ScheduleOtherParameter::Id))
                    .col(integer(ScheduleOtherParameter::ScheduleId).not_null())
                    .col(integer(ScheduleOtherParameter::ParameterId).not_null())
                    .col(integer(ScheduleOtherParameter::Count).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedule_parameter_schedule")
                            .from(
                                ScheduleOtherParameter::Table,
                                ScheduleOtherParameter::ScheduleId,
                            )
                            .to(Schedule::Table, Schedule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedule_parameter_parameter")
                            .from(
                                ScheduleOtherParameter::Table,
                                ScheduleOtherParameter::ParameterId,
                            )
                            .to(OtherParameter::Table, OtherParameter::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduleOtherParameter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoadContact::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoadChild::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoadAddress::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduleRoad::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Schedule::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Schedule {
    Table,
    Id,
    ParentId,
    Title,
    Description,
    DurationDays,
    ChildrenCount,
    TariffId,
    WeekDays,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum ScheduleRoad {
    Table,
    Id,
    ScheduleId,
    WeekDay,
    StartTime,
    EndTime,
    TypeDrive,
    Amount,
    Active,
}

#[derive(DeriveIden)]
pub enum RoadAddress {
    Table,
    Id,
    RoadId,
    AddressFrom,
    AddressTo,
    FromLat,
    FromLon,
    ToLat,
    ToLon,
    DistanceM,
    DurationS,
}

#[derive(DeriveIden)]
pub enum RoadChild {
    Table,
    Id,
    RoadId,
    ChildId,
    Active,
}

#[derive(DeriveIden)]
pub enum RoadContact {
    Table,
    Id,
    RoadId,
    Surname,
    Name,
    Patronymic,
    Phone,
    Active,
}

#[derive(DeriveIden)]
pub enum ScheduleOtherParameter {
    Table,
    Id,
    ScheduleId,
    ParameterId,
    Count,
}
