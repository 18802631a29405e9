//! Employee entity model
//!
//! This module contains the SeaORM entity model for the employees table along
//! with the closed vocabularies used by its profile fields.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::access::TenantOwned;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
pub enum Gender {
    #[default]
    #[sea_orm(string_value = "M")]
    #[serde(rename = "M")]
    Male,
    #[sea_orm(string_value = "F")]
    #[serde(rename = "F")]
    Female,
    #[sea_orm(string_value = "O")]
    #[serde(rename = "O")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
pub enum BloodGroup {
    #[sea_orm(string_value = "A+")]
    #[serde(rename = "A+")]
    APositive,
    #[sea_orm(string_value = "A-")]
    #[serde(rename = "A-")]
    ANegative,
    #[sea_orm(string_value = "B+")]
    #[serde(rename = "B+")]
    BPositive,
    #[sea_orm(string_value = "B-")]
    #[serde(rename = "B-")]
    BNegative,
    #[sea_orm(string_value = "AB+")]
    #[serde(rename = "AB+")]
    AbPositive,
    #[sea_orm(string_value = "AB-")]
    #[serde(rename = "AB-")]
    AbNegative,
    #[sea_orm(string_value = "O+")]
    #[serde(rename = "O+")]
    OPositive,
    #[sea_orm(string_value = "O-")]
    #[serde(rename = "O-")]
    ONegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum Religion {
    #[sea_orm(string_value = "Christianity")]
    Christianity,
    #[sea_orm(string_value = "Islam")]
    Islam,
    #[sea_orm(string_value = "Hinduism")]
    Hinduism,
    #[sea_orm(string_value = "Buddhism")]
    Buddhism,
    #[sea_orm(string_value = "Sikhism")]
    Sikhism,
    #[sea_orm(string_value = "Judaism")]
    Judaism,
    #[sea_orm(string_value = "Other")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum MaritalStatus {
    #[sea_orm(string_value = "Single")]
    Single,
    #[sea_orm(string_value = "Married")]
    Married,
    #[sea_orm(string_value = "Divorced")]
    Divorced,
    #[sea_orm(string_value = "Widowed")]
    Widowed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Company-assigned badge number, alphanumeric and unique per company
    pub employee_id: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// Derived from first and last name on every write
    pub full_name: String,

    pub department_id: Option<Uuid>,
    pub position: Option<String>,

    /// Digits only, globally unique
    #[sea_orm(unique)]
    pub contact_number: Option<String>,

    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub religion: Option<Religion>,
    pub marital_status: Option<MaritalStatus>,

    pub date_of_joining: Option<Date>,
    pub date_of_birth: Option<Date>,

    #[sea_orm(unique)]
    pub email: Option<String>,

    pub address: Option<String>,

    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,

    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id",
        on_delete = "Cascade"
    )]
    Company,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id",
        on_delete = "SetNull"
    )]
    Department,
    #[sea_orm(has_many = "super::attendance_log::Entity")]
    AttendanceLog,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

impl Related<super::attendance_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TenantOwned for Model {
    fn owner(&self) -> Option<Uuid> {
        Some(self.company_id)
    }
}

/// Joins the name parts the way they are displayed.
pub fn compose_full_name(first_name: Option<&str>, last_name: Option<&str>) -> String {
    [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
