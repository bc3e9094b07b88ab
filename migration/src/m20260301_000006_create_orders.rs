use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::User;
use super::m20260301_000003_create_admin::{OtherParameter, Tariff};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Order::Table)
                    .if_not_exists()
                    .col(pk_auto(Order::Id))
                    .col(integer(Order::ParentId).not_null())
                    .col(integer_null(Order::DriverId))
                    .col(integer_null(Order::ScheduleRoadId))
                    .col(integer(Order::StatusId).not_null())
                    .col(string_len(Order::TypeOrder, 20).not_null())
                    .col(string_len(Order::TypeDrive, 20).not_null())
                    .col(boolean(Order::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Order::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_parent")
                            .from(Order::Table, Order::ParentId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderAddress::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderAddress::Id))
                    .col(integer(OrderAddress::OrderId).not_null())
                    .col(string_len(OrderAddress::AddressFrom, 512).not_null())
                    .col(string_len(OrderAddress::AddressTo, 512).not_null())
                    .col(double(OrderAddress::FromLat).not_null())
                    .col(double(OrderAddress::FromLon).not_null())
                    .col(double(OrderAddress::ToLat).not_null())
                    .col(double(OrderAddress::ToLon).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_address_order")
                            .from(OrderAddress::Table, OrderAddress::OrderId)
                            .to(Order::Table, Order::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderInfo::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderInfo::Id))
                    .col(integer(OrderInfo::OrderId).not_null())
                    .col(decimal_len(OrderInfo::Price, 12, 2).not_null())
                    .col(integer(OrderInfo::DistanceM).not_null())
                    .col(integer(OrderInfo::DurationS).not_null())
                    .col(integer(OrderInfo::TariffId).not_null())
                    .col(text_null(OrderInfo::Description))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_info_order")
                            .from(OrderInfo::Table, OrderInfo::OrderId)
                            .to(Order::Table, Order::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_info_tariff")
                            .from(OrderInfo::Table, OrderInfo::TariffId)
                            .to(Tariff::Table, Tariff::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderOtherParameter::Table)
                    .if_not_exists()
                    .col(pk_auto(OrderOtherParameter::Id))
                    .col(integer(OrderOtherParameter::OrderId).not_null())
                    .col(integer(OrderOtherParameter::ParameterId).not_null())
                    .col(integer(OrderOtherParameter::Count).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_parameter_order")
                            .from(OrderOtherParameter::Table, OrderOtherParameter::OrderId)
                            .to(Order::Table, Order::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_parameter_parameter")
                            .from(
                                OrderOtherParameter::Table,
                                OrderOtherParameter::ParameterId,
                            )
                            .to(OtherParameter::Table, OtherParameter::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderOtherParameter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderInfo::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderAddress::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Order::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Order {
    Table,
    Id,
    ParentId,
    DriverId,
    ScheduleRoadId,
    StatusId,
    TypeOrder,
    TypeDrive,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum OrderAddress {
    Table,
    Id,
    OrderId,
    AddressFrom,
    AddressTo,
    FromLat,
    FromLon,
    ToLat,
    ToLon,
}

#[derive(DeriveIden)]
pub enum OrderInfo {
    Table,
    Id,
    OrderId,
    Price,
    DistanceM,
    DurationS,
    TariffId,
    Description,
}

#[derive(DeriveIden)]
pub enum OrderOtherParameter {
    Table,
    Id,
    OrderId,
    ParameterId,
    Count,
}
