use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Enumerated operation kinds of ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum BalanceTask {
    #[sea_orm(string_value = "top_up")]
    TopUp,
    #[sea_orm(string_value = "cashback")]
    Cashback,
    #[sea_orm(string_value = "commission")]
    Commission,
    #[sea_orm(string_value = "weekly_charge")]
    WeeklyCharge,
    #[sea_orm(string_value = "cancel_penalty")]
    CancelPenalty,
    #[sea_orm(string_value = "payout_request")]
    PayoutRequest,
    #[sea_orm(string_value = "payout_success")]
    PayoutSuccess,
    #[sea_orm(string_value = "admin_adjust")]
    AdminAdjust,
}

impl BalanceTask {
    /// Human-readable label shown in the client's balance history.
    pub fn label(&self) -> &'static str {
        match self {
            BalanceTask::TopUp => "Пополнение баланса",
            BalanceTask::Cashback => "Кэшбэк",
            BalanceTask::Commission => "Комиссия сервиса",
            BalanceTask::WeeklyCharge => "Оплата по расписанию",
            BalanceTask::CancelPenalty => "Штраф за отмену",
            BalanceTask::PayoutRequest => "Заявка на вывод",
            BalanceTask::PayoutSuccess => "Вывод средств",
            BalanceTask::AdminAdjust => "Корректировка",
        }
    }
}

/// Append-only; `money` is a signed delta already reflected in the
/// account row. Pending rows (`is_complete = false`) are payout holds
/// awaiting settlement.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balance_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub task: BalanceTask,
    pub money: Decimal,
    pub description: String,
    pub is_complete: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
