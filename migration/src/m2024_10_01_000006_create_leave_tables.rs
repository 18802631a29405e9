//! Migration to create holidays, leave bookkeeping and notices.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Holidays::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Holidays::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Holidays::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Holidays::Date).date().not_null())
                    .col(ColumnDef::new(Holidays::Reason).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Holidays::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Holidays::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_holidays_company_id")
                            .from(Holidays::Table, Holidays::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_holidays_company_date")
                    .table(Holidays::Table)
                    .col(Holidays::CompanyId)
                    .col(Holidays::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeaveTypes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LeaveTypes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LeaveTypes::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(LeaveTypes::Name).string_len(50).not_null())
                    .col(ColumnDef::new(LeaveTypes::DaysPerYear).integer().not_null())
                    .col(
                        ColumnDef::new(LeaveTypes::IsPaid)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(LeaveTypes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LeaveTypes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_types_company_id")
                            .from(LeaveTypes::Table, LeaveTypes::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leave_types_company_name")
                    .table(LeaveTypes::Table)
                    .col(LeaveTypes::CompanyId)
                    .col(LeaveTypes::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeaveBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeaveBalances::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeaveBalances::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(LeaveBalances::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(LeaveBalances::LeaveTypeId).uuid().not_null())
                    .col(ColumnDef::new(LeaveBalances::Year).integer().not_null())
                    .col(
                        ColumnDef::new(LeaveBalances::AllocatedDays)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LeaveBalances::UsedDays)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LeaveBalances::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LeaveBalances::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_balances_company_id")
                            .from(LeaveBalances::Table, LeaveBalances::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_balances_employee_id")
                            .from(LeaveBalances::Table, LeaveBalances::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_balances_leave_type_id")
                            .from(LeaveBalances::Table, LeaveBalances::LeaveTypeId)
                            .to(LeaveTypes::Table, LeaveTypes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leave_balances_employee_type_year")
                    .table(LeaveBalances::Table)
                    .col(LeaveBalances::EmployeeId)
                    .col(LeaveBalances::LeaveTypeId)
                    .col(LeaveBalances::Year)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeaveRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeaveRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeaveRequests::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(LeaveRequests::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(LeaveRequests::LeaveTypeId).uuid().not_null())
                    .col(ColumnDef::new(LeaveRequests::StartDate).date().not_null())
                    .col(ColumnDef::new(LeaveRequests::EndDate).date().not_null())
                    .col(ColumnDef::new(LeaveRequests::Reason).string_len(500).null())
                    .col(
                        ColumnDef::new(LeaveRequests::Status)
                            .string_len(10)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(LeaveRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LeaveRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_requests_company_id")
                            .from(LeaveRequests::Table, LeaveRequests::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_requests_employee_id")
                            .from(LeaveRequests::Table, LeaveRequests::EmployeeId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leave_requests_leave_type_id")
                            .from(LeaveRequests::Table, LeaveRequests::LeaveTypeId)
                            .to(LeaveTypes::Table, LeaveTypes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leave_requests_employee_start")
                    .table(LeaveRequests::Table)
                    .col(LeaveRequests::EmployeeId)
                    .col(LeaveRequests::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notices::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Notices::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Notices::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Notices::Body).text().not_null())
                    .col(
                        ColumnDef::new(Notices::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Notices::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Notices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Notices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notices_company_id")
                            .from(Notices::Table, Notices::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notices::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LeaveRequests::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LeaveBalances::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LeaveTypes::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Holidays::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Holidays {
    Table,
    Id,
    CompanyId,
    Date,
    Reason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LeaveTypes {
    Table,
    Id,
    CompanyId,
    Name,
    DaysPerYear,
    IsPaid,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LeaveBalances {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    LeaveTypeId,
    Year,
    AllocatedDays,
    UsedDays,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LeaveRequests {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    LeaveTypeId,
    StartDate,
    EndDate,
    Reason,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Notices {
    Table,
    Id,
    CompanyId,
    Title,
    Body,
    PublishedAt,
    IsActive,
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
