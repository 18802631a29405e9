//! Device entity model
//!
//! Biometric / card terminals that push punches for a company.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::access::TenantOwned;

/// Port used by terminals when none is configured.
pub const DEFAULT_PORT: i32 = 4370;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Hardware identifier, globally unique
    #[sea_orm(unique)]
    pub device_id: String,

    pub location: String,
    pub description: Option<String>,

    /// Unique per company
    pub ip_address: String,

    #[sea_orm(unique)]
    pub serial_number: Option<String>,

    pub port: i32,

    pub last_sync_time: Option<DateTimeWithTimeZone>,

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
    #[sea_orm(has_many = "super::attendance_log::Entity")]
    AttendanceLog,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
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
