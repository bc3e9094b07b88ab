use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One user may hold several roles, so roles live in a join table.
        manager
            .create_type(
                Type::create()
                    .as_enum(UserRole::Enum)
                    .values([
                        UserRole::Parent,
                        UserRole::Driver,
                        UserRole::Operator,
                        UserRole::Manager,
                        UserRole::Partner,
                        UserRole::FranchiseAdmin,
                        UserRole::Admin,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string_len(User::Phone, 20).not_null().unique_key())
                    .col(string_len(User::PasswordHash, 255).not_null())
                    .col(string_len(User::Surname, 100).not_null())
                    .col(string_len(User::Name, 100).not_null())
                    .col(string_len_null(User::Patronymic, 100))
                    .col(string_len_null(User::Email, 255))
                    .col(integer_null(User::FranchiseId))
                    .col(boolean(User::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserRoleAssignment::Table)
                    .if_not_exists()
                    .col(pk_auto(UserRoleAssignment::Id))
                    .col(integer(UserRoleAssignment::UserId).not_null())
                    .col(
                        ColumnDef::new(UserRoleAssignment::Role)
                            .custom(UserRole::Enum)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_role_user")
                            .from(UserRoleAssignment::Table, UserRoleAssignment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PushToken::Table)
                    .if_not_exists()
                    .col(pk_auto(PushToken::Id))
                    .col(integer(PushToken::UserId).not_null())
                    .col(string_len(PushToken::Token, 512).not_null())
                    .col(boolean(PushToken::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(PushToken::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_push_token_user")
                            .from(PushToken::Table, PushToken::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Card::Table)
                    .if_not_exists()
                    .col(pk_auto(Card::Id))
                    .col(integer(Card::UserId).not_null())
                    .col(string_len(Card::ProviderCardId, 128).not_null())
                    .col(string_len(Card::PanMasked, 20).not_null())
                    .col(boolean(Card::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Card::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_user")
                            .from(Card::Table, Card::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(pk_auto(Notification::Id))
                    .col(integer(Notification::UserId).not_null())
                    .col(string_len(Notification::Title, 255).not_null())
                    .col(text(Notification::Description).not_null())
                    .col(boolean(Notification::IsReaded).not_null().default(false))
                    .col(
                        timestamp_with_time_zone(Notification::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notification::Table, Notification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Card::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PushToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserRoleAssignment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(UserRole::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Phone,
    PasswordHash,
    Surname,
    Name,
    Patronymic,
    Email,
    FranchiseId,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum UserRole {
    #[sea_orm(iden = "user_role")]
    Enum,
    Parent,
    Driver,
    Operator,
    Manager,
    Partner,
    FranchiseAdmin,
    Admin,
}

#[derive(DeriveIden)]
pub enum UserRoleAssignment {
    #[sea_orm(iden = "user_roles")]
    Table,
    Id,
    UserId,
    Role,
}

#[derive(DeriveIden)]
pub enum PushToken {
    Table,
    Id,
    UserId,
    Token,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Card {
    Table,
    Id,
    UserId,
    ProviderCardId,
    PanMasked,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Notification {
    Table,
    Id,
    UserId,
    Title,
    Description,
    IsReaded,
    CreatedAt,
}
