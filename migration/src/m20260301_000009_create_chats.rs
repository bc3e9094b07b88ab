use sea_orm_migration::{prelude::*, schema::*};

use super::m20260301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Chat::Table)
                    .if_not_exists()
                    .col(pk_auto(Chat::Id))
                    .col(boolean(Chat::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Chat::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatParticipant::Table)
                    .if_not_exists()
                    .col(pk_auto(ChatParticipant::Id))
                    .col(integer(ChatParticipant::ChatId).not_null())
                    .col(integer(ChatParticipant::UserId).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_participant_chat")
                            .from(ChatParticipant::Table, ChatParticipant::ChatId)
                            .to(Chat::Table, Chat::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_participant_user")
                            .from(ChatParticipant::Table, ChatParticipant::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .if_not_exists()
                    .col(pk_auto(Message::Id))
                    .col(integer(Message::ChatId).not_null())
                    .col(integer(Message::SenderId).not_null())
                    .col(text(Message::Msg).not_null())
                    .col(integer(Message::MsgType).not_null())
                    .col(big_integer(Message::TimestampSend).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_chat")
                            .from(Message::Table, Message::ChatId)
                            .to(Chat::Table, Chat::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_sender")
                            .from(Message::Table, Message::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatNotification::Table)
                    .if_not_exists()
                    .col(pk_auto(ChatNotification::Id))
                    .col(integer(ChatNotification::ChatId).not_null())
                    .col(integer(ChatNotification::MessageId).not_null())
                    .col(integer(ChatNotification::UserId).not_null())
                    .col(boolean(ChatNotification::IsReaded).not_null().default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_notification_chat")
                            .from(ChatNotification::Table, ChatNotification::ChatId)
                            .to(Chat::Table, Chat::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_notification_message")
                            .from(ChatNotification::Table, ChatNotification::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_notification_user")
                            .from(ChatNotification::Table, ChatNotification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChatParticipantToken::Table)
                    .if_not_exists()
                    .col(pk_auto(ChatParticipantToken::Id))
                    .col(integer(ChatParticipantToken::UserId).not_null())
                    .col(
                        string_len(ChatParticipantToken::Token, 64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        timestamp_with_time_zone(ChatParticipantToken::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_token_user")
                            .from(ChatParticipantToken::Table, ChatParticipantToken::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatParticipantToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChatNotification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Message::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChatParticipant::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Chat::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Chat {
    Table,
    Id,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum ChatParticipant {
    Table,
    Id,
    ChatId,
    UserId,
}

#[derive(DeriveIden)]
pub enum Message {
    Table,
    Id,
    ChatId,
    SenderId,
    Msg,
    MsgType,
    TimestampSend,
}

#[derive(DeriveIden)]
pub enum ChatNotification {
    Table,
    Id,
    ChatId,
    MessageId,
    UserId,
    IsReaded,
}

#[derive(DeriveIden)]
pub enum ChatParticipantToken {
    Table,
    Id,
    UserId,
    Token,
    CreatedAt,
}
