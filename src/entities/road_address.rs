use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One from/to pair of a road. Chains (intermediate points) are consecutive
/// rows ordered by id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "road_address")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub road_id: i32,
    pub address_from: String,
    pub address_to: String,
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
    pub distance_m: Option<i32>,
    pub duration_s: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule_road::Entity",
        from = "Column::RoadId",
        to = "super::schedule_road::Column::Id"
    )]
    Road,
}

impl Related<super::schedule_road::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Road.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
