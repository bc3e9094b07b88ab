use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Assignment of a driver to a road, created when a bid is accepted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "road_driver")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub road_id: i32,
    pub driver_id: i32,
    pub is_repeat: bool,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule_road::Entity",
        from = "Column::RoadId",
        to = "super::schedule_road::Column::Id"
    )]
    Road,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
}

impl ActiveModelBehavior for ActiveModel {}
