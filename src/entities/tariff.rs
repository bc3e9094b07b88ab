use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tariff")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub franchise_id: i32,
    pub title: String,
    /// Per-kilometre cost (the `M` input of the pricing function).
    pub cost_per_km: Decimal,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::franchise::Entity",
        from = "Column::FranchiseId",
        to = "super::franchise::Column::Id"
    )]
    Franchise,
}

impl Related<super::franchise::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Franchise.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
