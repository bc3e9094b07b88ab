use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-off ride status. Parents are notified on transitions to
/// EnRoute, Arrived, InTrip (child in car) and Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum DrivingStatus {
    #[sea_orm(num_value = 1)]
    Created = 1,
    #[sea_orm(num_value = 2)]
    EnRoute = 2,
    #[sea_orm(num_value = 3)]
    Arrived = 3,
    #[sea_orm(num_value = 4)]
    InTrip = 4,
    #[sea_orm(num_value = 5)]
    Completed = 5,
    #[sea_orm(num_value = 6)]
    Cancelled = 6,
    #[sea_orm(num_value = 7)]
    Searching = 7,
    #[sea_orm(num_value = 8)]
    Assigned = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TypeOrder {
    #[sea_orm(string_value = "single")]
    Single,
    #[sea_orm(string_value = "schedule")]
    Schedule,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub parent_id: i32,
    pub driver_id: Option<i32>,
    /// Set for schedule-generated trips. Links back to the road so safety
    /// events can reach the children and contacts riding it.
    pub schedule_road_id: Option<i32>,
    pub status_id: DrivingStatus,
    pub type_order: TypeOrder,
    pub type_drive: super::schedule_road::TypeDrive,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ParentId",
        to = "super::user::Column::Id"
    )]
    Parent,
    #[sea_orm(has_many = "super::order_address::Entity")]
    Addresses,
}

impl Related<super::order_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
