use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Franchise::Table)
                    .if_not_exists()
                    .col(pk_auto(Franchise::Id))
                    .col(string_len(Franchise::Name, 200).not_null())
                    .col(boolean(Franchise::Active).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tariff::Table)
                    .if_not_exists()
                    .col(pk_auto(Tariff::Id))
                    .col(integer(Tariff::FranchiseId).not_null())
                    .col(string_len(Tariff::Title, 200).not_null())
                    .col(decimal_len(Tariff::CostPerKm, 12, 2).not_null())
                    .col(boolean(Tariff::Active).not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tariff_franchise")
                            .from(Tariff::Table, Tariff::FranchiseId)
                            .to(Franchise::Table, Franchise::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PricingCoefficients::Table)
                    .if_not_exists()
                    .col(pk_auto(PricingCoefficients::Id))
                    .col(double(PricingCoefficients::Vm).not_null())
                    .col(double(PricingCoefficients::S1).not_null())
                    .col(double(PricingCoefficients::Kc).not_null())
                    .col(double(PricingCoefficients::Ks).not_null())
                    .col(double(PricingCoefficients::Kg).not_null())
                    .col(double(PricingCoefficients::T1).not_null())
                    .col(double(PricingCoefficients::M).not_null())
                    .col(double(PricingCoefficients::X5).not_null())
                    .col(double(PricingCoefficients::PInsurance).not_null())
                    .col(boolean(PricingCoefficients::Active).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OtherParameter::Table)
                    .if_not_exists()
                    .col(pk_auto(OtherParameter::Id))
                    .col(string_len(OtherParameter::Title, 200).not_null())
                    .col(boolean(OtherParameter::Active).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        // Leader-election leases for singleton background jobs.
        manager
            .create_table(
                Table::create()
                    .table(Lease::Table)
                    .if_not_exists()
                    .col(string_len(Lease::Name, 100).not_null().primary_key())
                    .col(string_len(Lease::Owner, 100).not_null())
                    .col(timestamp_with_time_zone(Lease::ExpiresAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lease::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OtherParameter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PricingCoefficients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tariff::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Franchise::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Franchise {
    Table,
    Id,
    Name,
    Active,
}

#[derive(DeriveIden)]
pub enum Tariff {
    Table,
    Id,
    FranchiseId,
    Title,
    CostPerKm,
    Active,
}

#[derive(DeriveIden)]
pub enum PricingCoefficients {
    Table,
    Id,
    Vm,
    S1,
    Kc,
    Ks,
    Kg,
    T1,
    M,
    X5,
    PInsurance,
    Active,
}

#[derive(DeriveIden)]
pub enum OtherParameter {
    Table,
    Id,
    Title,
    Active,
}

#[derive(DeriveIden)]
pub enum Lease {
    Table,
    Name,
    Owner,
    ExpiresAt,
}
