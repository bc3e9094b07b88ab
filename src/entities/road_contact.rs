use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Optional contact person attached to a road (e.g. a grandparent who meets
/// the child at the drop-off).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "road_contact")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub road_id: i32,
    pub surname: String,
    pub name: String,
    pub patronymic: Option<String>,
    pub phone: String,
    pub active: bool,
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

impl ActiveModelBehavior for ActiveModel {}
