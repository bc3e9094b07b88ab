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
                    .table(Child::Table)
                    .if_not_exists()
                    .col(pk_auto(Child::Id))
                    .col(integer(Child::ParentId).not_null())
                    .col(string_len(Child::Surname, 100).not_null())
                    .col(string_len(Child::Name, 100).not_null())
                    .col(string_len_null(Child::Patronymic, 100))
                    .col(date_null(Child::Birthday))
                    .col(string_len_null(Child::SchoolClass, 20))
                    .col(text_null(Child::CharacterNotes))
                    .col(string_len_null(Child::Photo, 512))
                    .col(boolean(Child::Active).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Child::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_child_parent")
                            .from(Child::Table, Child::ParentId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmergencyContact::Table)
                    .if_not_exists()
                    .col(pk_auto(EmergencyContact::Id))
                    .col(integer(EmergencyContact::ChildId).not_null())
                    .col(string_len(EmergencyContact::Name, 200).not_null())
                    .col(string_len(EmergencyContact::Relationship, 100).not_null())
                    .col(string_len(EmergencyContact::Phone, 20).not_null())
                    .col(integer(EmergencyContact::Priority).not_null())
                    .col(boolean(EmergencyContact::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emergency_contact_child")
                            .from(EmergencyContact::Table, EmergencyContact::ChildId)
                            .to(Child::Table, Child::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MedicalInfo::Table)
                    .if_not_exists()
                    .col(pk_auto(MedicalInfo::Id))
                    .col(integer(MedicalInfo::ChildId).not_null())
                    .col(text_null(MedicalInfo::Allergies))
                    .col(text_null(MedicalInfo::ChronicDiseases))
                    .col(text_null(MedicalInfo::Medications))
                    .col(string_len_null(MedicalInfo::BloodType, 3))
                    .col(string_len_null(MedicalInfo::PolicyNumber, 16))
                    .col(boolean(MedicalInfo::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_medical_info_child")
                            .from(MedicalInfo::Table, MedicalInfo::ChildId)
                            .to(Child::Table, Child::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MedicalInfo::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmergencyContact::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Child::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Child {
    Table,
    Id,
    ParentId,
    Surname,
    Name,
    Patronymic,
    Birthday,
    SchoolClass,
    CharacterNotes,
    Photo,
    Active,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum EmergencyContact {
    Table,
    Id,
    ChildId,
    Name,
    Relationship,
    Phone,
    Priority,
    Active,
}

#[derive(DeriveIden)]
pub enum MedicalInfo {
    Table,
    Id,
    ChildId,
    Allergies,
    ChronicDiseases,
    Medications,
    BloodType,
    PolicyNumber,
    Active,
}
