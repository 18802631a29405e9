//! Attendance log entity model
//!
//! One row per punch. Rows reference (not own) their employee and device and
//! disappear together with them.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::access::TenantOwned;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InOutStatus {
    #[default]
    #[sea_orm(string_value = "IN")]
    In,
    #[sea_orm(string_value = "OUT")]
    Out,
    #[sea_orm(string_value = "BREAK_IN")]
    BreakIn,
    #[sea_orm(string_value = "BREAK_OUT")]
    BreakOut,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    /// Fingerprint
    #[default]
    #[sea_orm(string_value = "FP")]
    Fp,
    #[sea_orm(string_value = "FACE")]
    Face,
    #[sea_orm(string_value = "CARD")]
    Card,
    #[sea_orm(string_value = "PWD")]
    Pwd,
    #[sea_orm(string_value = "GPS")]
    Gps,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PunchMode {
    #[default]
    #[sea_orm(string_value = "AUTO")]
    Auto,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub device_id: Option<Uuid>,

    /// Unique per employee
    pub punch_datetime: DateTimeWithTimeZone,

    pub in_out_status: InOutStatus,
    pub verification_method: VerificationMethod,
    pub punch_mode: PunchMode,

    pub work_code: Option<String>,

    /// Set once the punch has been pulled from the terminal
    pub sync: bool,

    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

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
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id",
        on_delete = "Cascade"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id",
        on_delete = "Cascade"
    )]
    Device,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TenantOwned for Model {
    fn owner(&self) -> Option<Uuid> {
        Some(self.company_id)
    }
}
