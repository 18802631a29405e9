//! Migration to create the shifts, schedules and work_hours tables.
//!
//! Durations are stored as whole minutes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Shifts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Shifts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Shifts::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Shifts::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Shifts::StartTime).time().not_null())
                    .col(ColumnDef::new(Shifts::EndTime).time().not_null())
                    .col(ColumnDef::new(Shifts::BreakMinutes).integer().null())
                    .col(
                        ColumnDef::new(Shifts::Status)
                            .string_len(10)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Shifts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Shifts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shifts_company_id")
                            .from(Shifts::Table, Shifts::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shifts_company_name")
                    .table(Shifts::Table)
                    .col(Shifts::CompanyId)
                    .col(Shifts::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Schedules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Schedules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Schedules::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Schedules::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Schedules::ShiftId).uuid().not_null())
                    .col(ColumnDef::new(Schedules::Workdays).json_binary().not_null())
                    .col(
                        ColumnDef::new(Schedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Schedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_company_id")
                            .from(Schedules::Table, Schedules::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_employee_id")
                            .from(Schedules::Table, Schedules::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_schedules_shift_id")
                            .from(Schedules::Table, Schedules::ShiftId)
                            .to(Shifts::Table, Shifts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkHours::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WorkHours::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(WorkHours::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(WorkHours::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(WorkHours::Date).date().not_null())
                    .col(ColumnDef::new(WorkHours::TotalMinutes).integer().not_null())
                    .col(ColumnDef::new(WorkHours::OvertimeMinutes).integer().null())
                    .col(
                        ColumnDef::new(WorkHours::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WorkHours::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_work_hours_company_id")
                            .from(WorkHours::Table, WorkHours::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_work_hours_employee_id")
                            .from(WorkHours::Table, WorkHours::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_hours_employee_date")
                    .table(WorkHours::Table)
                    .col(WorkHours::EmployeeId)
                    .col(WorkHours::Date)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkHours::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Schedules::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Shifts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Shifts {
    Table,
    Id,
    CompanyId,
    Name,
    StartTime,
    EndTime,
    BreakMinutes,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Schedules {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    ShiftId,
    Workdays,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WorkHours {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    Date,
    TotalMinutes,
    OvertimeMinutes,
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
