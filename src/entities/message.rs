use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum MsgType {
    #[sea_orm(num_value = 1)]
    Text = 1,
    #[sea_orm(num_value = 2)]
    Image = 2,
    #[sea_orm(num_value = 3)]
    Video = 3,
    #[sea_orm(num_value = 4)]
    File = 4,
    #[sea_orm(num_value = 5)]
    TripToken = 5,
}

/// Within a chat, ids are strictly increasing and authoritative for display
/// order; `timestamp_send` is seconds since epoch, assigned by the server.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub chat_id: i32,
    pub sender_id: i32,
    pub msg: String,
    pub msg_type: MsgType,
    pub timestamp_send: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat::Entity",
        from = "Column::ChatId",
        to = "super::chat::Column::Id"
    )]
    Chat,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id"
    )]
    Sender,
}

impl Related<super::chat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
