use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 4-digit one-time code for in-person driver/parent verification.
/// A code counts as live while `active && !used && now <= expires_at`;
/// issuing a new code for the same (driver, road) deactivates older ones.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meeting_code")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub driver_id: i32,
    pub schedule_road_id: i32,
    pub code: i32,
    pub issued_at: DateTimeWithTimeZone,
    pub expires_at: DateTimeWithTimeZone,
    pub used: bool,
    pub active: bool,
    pub verified_by: Option<i32>,
    pub used_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
    #[sea_orm(
        belongs_to = "super::schedule_road::Entity",
        from = "Column::ScheduleRoadId",
        to = "super::schedule_road::Column::Id"
    )]
    Road,
}

impl ActiveModelBehavior for ActiveModel {}
