//! Migration to create the devices and attendance_logs tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Devices::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Devices::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(Devices::DeviceId)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Devices::Location).string_len(100).not_null())
                    .col(ColumnDef::new(Devices::Description).string_len(255).null())
                    .col(ColumnDef::new(Devices::IpAddress).string_len(45).not_null())
                    .col(
                        ColumnDef::new(Devices::SerialNumber)
                            .string_len(255)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Devices::Port)
                            .integer()
                            .not_null()
                            .default(4370),
                    )
                    .col(
                        ColumnDef::new(Devices::LastSyncTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Devices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Devices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_devices_company_id")
                            .from(Devices::Table, Devices::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_devices_company_ip_address")
                    .table(Devices::Table)
                    .col(Devices::CompanyId)
                    .col(Devices::IpAddress)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AttendanceLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AttendanceLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AttendanceLogs::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(AttendanceLogs::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(AttendanceLogs::DeviceId).uuid().null())
                    .col(
                        ColumnDef::new(AttendanceLogs::PunchDatetime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AttendanceLogs::InOutStatus)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AttendanceLogs::VerificationMethod)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AttendanceLogs::PunchMode)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AttendanceLogs::WorkCode).string_len(20).null())
                    .col(
                        ColumnDef::new(AttendanceLogs::Sync)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AttendanceLogs::LocationName)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(AttendanceLogs::Latitude).double().null())
                    .col(ColumnDef::new(AttendanceLogs::Longitude).double().null())
                    .col(
                        ColumnDef::new(AttendanceLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AttendanceLogs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_logs_company_id")
                            .from(AttendanceLogs::Table, AttendanceLogs::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_logs_employee_id")
                            .from(AttendanceLogs::Table, AttendanceLogs::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_logs_device_id")
                            .from(AttendanceLogs::Table, AttendanceLogs::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_logs_employee_punch")
                    .table(AttendanceLogs::Table)
                    .col(AttendanceLogs::EmployeeId)
                    .col(AttendanceLogs::PunchDatetime)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_logs_company_punch")
                    .table(AttendanceLogs::Table)
                    .col(AttendanceLogs::CompanyId)
                    .col(AttendanceLogs::PunchDatetime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AttendanceLogs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Devices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    CompanyId,
    DeviceId,
    Location,
    Description,
    IpAddress,
    SerialNumber,
    Port,
    LastSyncTime,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AttendanceLogs {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    DeviceId,
    PunchDatetime,
    InOutStatus,
    VerificationMethod,
    PunchMode,
    WorkCode,
    Sync,
    LocationName,
    Latitude,
    Longitude,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
}
