use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Singleton row of global constants consumed by the pricing function.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pricing_coefficients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Average speed, km/h.
    pub vm: f64,
    /// Pickup radius, km.
    pub s1: f64,
    /// Cashback, percent.
    pub kc: f64,
    /// Insurance, percent.
    pub ks: f64,
    /// City coefficient.
    pub kg: f64,
    pub t1: f64,
    pub m: f64,
    pub x5: f64,
    pub p_insurance: f64,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
