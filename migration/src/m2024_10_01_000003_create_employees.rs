//! Migration to create the departments and employees tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Departments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Departments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Departments::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Departments::Name).string_len(50).not_null())
                    .col(ColumnDef::new(Departments::Description).text().null())
                    .col(
                        ColumnDef::new(Departments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Departments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_departments_company_id")
                            .from(Departments::Table, Departments::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_departments_company_name")
                    .table(Departments::Table)
                    .col(Departments::CompanyId)
                    .col(Departments::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Employees::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employees::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Employees::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(Employees::EmployeeId)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Employees::FirstName).string_len(50).null())
                    .col(ColumnDef::new(Employees::LastName).string_len(50).null())
                    .col(ColumnDef::new(Employees::FullName).string_len(101).not_null())
                    .col(ColumnDef::new(Employees::DepartmentId).uuid().null())
                    .col(ColumnDef::new(Employees::Position).string_len(50).null())
                    .col(
                        ColumnDef::new(Employees::ContactNumber)
                            .string_len(15)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Employees::Gender)
                            .string_len(1)
                            .not_null()
                            .default("M"),
                    )
                    .col(ColumnDef::new(Employees::BloodGroup).string_len(3).null())
                    .col(ColumnDef::new(Employees::Religion).string_len(20).null())
                    .col(ColumnDef::new(Employees::MaritalStatus).string_len(10).null())
                    .col(ColumnDef::new(Employees::DateOfJoining).date().null())
                    .col(ColumnDef::new(Employees::DateOfBirth).date().null())
                    .col(
                        ColumnDef::new(Employees::Email)
                            .string_len(254)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employees::Address).text().null())
                    .col(ColumnDef::new(Employees::BankName).string_len(100).null())
                    .col(
                        ColumnDef::new(Employees::BankAccountNumber)
                            .string_len(34)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Employees::EmergencyContactName)
                            .string_len(100)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Employees::EmergencyContactNumber)
                            .string_len(15)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Employees::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Employees::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employees_company_id")
                            .from(Employees::Table, Employees::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employees_department_id")
                            .from(Employees::Table, Employees::DepartmentId)
                            .to(Departments::Table, Departments::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_employees_company_employee_id")
                    .table(Employees::Table)
                    .col(Employees::CompanyId)
                    .col(Employees::EmployeeId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Employees::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Departments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Departments {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    FirstName,
    LastName,
    FullName,
    DepartmentId,
    Position,
    ContactNumber,
    Gender,
    BloodGroup,
    Religion,
    MaritalStatus,
    DateOfJoining,
    DateOfBirth,
    Email,
    Address,
    BankName,
    BankAccountNumber,
    EmergencyContactName,
    EmergencyContactNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}
