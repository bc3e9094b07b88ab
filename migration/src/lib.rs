pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_family;
mod m20260301_000003_create_admin;
mod m20260301_000004_create_schedules;
mod m20260301_000005_create_wait_data;
mod m20260301_000006_create_orders;
mod m20260301_000007_create_safety;
mod m20260301_000008_create_history;
mod m20260301_000009_create_chats;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users::Migration),
            Box::new(m20260301_000002_create_family::Migration),
            Box::new(m20260301_000003_create_admin::Migration),
            Box::new(m20260301_000004_create_schedules::Migration),
            Box::new(m20260301_000005_create_wait_data::Migration),
            Box::new(m20260301_000006_create_orders::Migration),
            Box::new(m20260301_000007_create_safety::Migration),
            Box::new(m20260301_000008_create_history::Migration),
            Box::new(m20260301_000009_create_chats::Migration),
        ]
    }
}
