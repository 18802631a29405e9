//! Database migrations for the attendance service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2024_10_01_000001_create_companies;
mod m2024_10_01_000002_create_users;
mod m2024_10_01_000003_create_employees;
mod m2024_10_01_000004_create_devices_and_attendance_logs;
mod m2024_10_01_000005_create_shifts_and_schedules;
mod m2024_10_01_000006_create_leave_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2024_10_01_000001_create_companies::Migration),
            Box::new(m2024_10_01_000002_create_users::Migration),
            Box::new(m2024_10_01_000003_create_employees::Migration),
            Box::new(m2024_10_01_000004_create_devices_and_attendance_logs::Migration),
            Box::new(m2024_10_01_000005_create_shifts_and_schedules::Migration),
            Box::new(m2024_10_01_000006_create_leave_tables::Migration),
        ]
    }
}
