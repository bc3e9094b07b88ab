use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::{Card, User};
use super::m20260301_000004_create_schedules::Schedule;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BalanceAccount::Table)
                    .if_not_exists()
                    .col(pk_auto(BalanceAccount::Id))
                    .col(integer(BalanceAccount::UserId).not_null().unique_key())
                    .col(decimal_len(BalanceAccount::Money, 12, 2).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_balance_account_user")
                            .from(BalanceAccount::Table, BalanceAccount::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BalanceHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(BalanceHistory::Id))
                    .col(integer(BalanceHistory::UserId).not_null())
                    .col(string_len(BalanceHistory::Task, 30).not_null())
                    .col(decimal_len(BalanceHistory::Money, 12, 2).not_null())
                    .col(string_len(BalanceHistory::Description, 512).not_null())
                    .col(boolean(BalanceHistory::IsComplete).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(BalanceHistory::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_balance_history_user")
                            .from(BalanceHistory::Table, BalanceHistory::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payment::Table)
                    .if_not_exists()
                    .col(pk_auto(Payment::Id))
                    .col(integer(Payment::UserId).not_null())
                    .col(string_len(Payment::OrderKey, 64).not_null().unique_key())
                    .col(string_len_null(Payment::ProviderPaymentId, 64))
                    .col(decimal_len(Payment::Amount, 12, 2).not_null())
                    .col(string_len(Payment::Kind, 10).not_null())
                    .col(string_len(Payment::Status, 30).not_null())
                    .col(
                        timestamp_with_time_zone(Payment::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Payment::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_user")
                            .from(Payment::Table, Payment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WeeklyPaymentSchedule::Table)
                    .if_not_exists()
                    .col(pk_auto(WeeklyPaymentSchedule::Id))
                    .col(integer(WeeklyPaymentSchedule::UserId).not_null())
                    .col(integer(WeeklyPaymentSchedule::ScheduleId).not_null())
                    .col(decimal_len(WeeklyPaymentSchedule::Amount, 12, 2).not_null())
                    .col(integer_null(WeeklyPaymentSchedule::CardId))
                    .col(date(WeeklyPaymentSchedule::NextPaymentDate).not_null())
                    .col(date_null(WeeklyPaymentSchedule::LastPaymentDate))
                    .col(string_len(WeeklyPaymentSchedule::Status, 20).not_null())
                    .col(
                        integer(WeeklyPaymentSchedule::FailedAttempts)
                            .not_null()
                            .default(0),
                    )
                    .col(string_len_null(WeeklyPaymentSchedule::LastError, 512))
                    .col(
                        timestamp_with_time_zone(WeeklyPaymentSchedule::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_payment_user")
                            .from(WeeklyPaymentSchedule::Table, WeeklyPaymentSchedule::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_payment_schedule")
                            .from(
                                WeeklyPaymentSchedule::Table,
                                WeeklyPaymentSchedule::ScheduleId,
                            )
                            .to(Schedule::Table, Schedule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_payment_card")
                            .from(WeeklyPaymentSchedule::Table, WeeklyPaymentSchedule::CardId)
                            .to(Card::Table, Card::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WeeklyPaymentHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(WeeklyPaymentHistory::Id))
                    .col(integer(WeeklyPaymentHistory::WeeklyPaymentId).not_null())
                    .col(string_len(WeeklyPaymentHistory::Status, 20).not_null())
                    .col(decimal_len(WeeklyPaymentHistory::Amount, 12, 2).not_null())
                    .col(string_len_null(WeeklyPaymentHistory::ErrorMessage, 512))
                    .col(string_len_null(WeeklyPaymentHistory::PaymentId, 64))
                    .col(
                        timestamp_with_time_zone(WeeklyPaymentHistory::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_weekly_history_weekly")
                            .from(
                                WeeklyPaymentHistory::Table,
                                WeeklyPaymentHistory::WeeklyPaymentId,
                            )
                            .to(WeeklyPaymentSchedule::Table, WeeklyPaymentSchedule::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WeeklyPaymentHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WeeklyPaymentSchedule::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BalanceHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BalanceAccount::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BalanceAccount {
    Table,
    Id,
    UserId,
    Money,
}

#[derive(DeriveIden)]
pub enum BalanceHistory {
    Table,
    Id,
    UserId,
    Task,
    Money,
    Description,
    IsComplete,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Payment {
    Table,
    Id,
    UserId,
    OrderKey,
    ProviderPaymentId,
    Amount,
    Kind,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum WeeklyPaymentSchedule {
    Table,
    Id,
    UserId,
    ScheduleId,
    Amount,
    CardId,
    NextPaymentDate,
    LastPaymentDate,
    Status,
    FailedAttempts,
    LastError,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum WeeklyPaymentHistory {
    Table,
    Id,
    WeeklyPaymentId,
    Status,
    Amount,
    ErrorMessage,
    PaymentId,
    CreatedAt,
}
