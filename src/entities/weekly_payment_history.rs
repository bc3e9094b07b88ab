use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "pending")]
    Pending,
}

/// Append-only record of every charge attempt.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "weekly_payment_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub weekly_payment_id: i32,
    pub status: AttemptStatus,
    pub amount: Decimal,
    pub error_message: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::weekly_payment_schedule::Entity",
        from = "Column::WeeklyPaymentId",
        to = "super::weekly_payment_schedule::Column::Id"
    )]
    WeeklyPayment,
}

impl Related<super::weekly_payment_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeeklyPayment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
