use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TypeDrive {
    #[sea_orm(string_value = "one_way")]
    OneWay,
    #[sea_orm(string_value = "round_trip")]
    RoundTrip,
    #[sea_orm(string_value = "with_intermediate")]
    WithIntermediate,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schedule_road")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub schedule_id: i32,
    /// Weekday 0..=6, 0 = Monday.
    pub week_day: i16,
    /// "HH:MM".
    pub start_time: String,
    /// "HH:MM".
    pub end_time: String,
    pub type_drive: TypeDrive,
    pub amount: Decimal,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::schedule::Column::Id"
    )]
    Schedule,
    #[sea_orm(has_many = "super::road_address::Entity")]
    Addresses,
    #[sea_orm(has_many = "super::road_child::Entity")]
    Children,
}

impl Related<super::schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::road_address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
