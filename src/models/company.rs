//! Company entity model
//!
//! Companies are the tenants. Every business record belongs to exactly one
//! company and is removed together with it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::access::TenantOwned;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub name: String,

    pub address: Option<String>,

    /// Inactive companies lose access to every tenant-scoped route
    pub is_active: bool,

    pub subscription_id: Option<Uuid>,

    /// Overrides the subscription's `max_employees` when set
    pub employee_limit: Option<i32>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::Id",
        on_delete = "SetNull"
    )]
    Subscription,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TenantOwned for Model {
    fn owner(&self) -> Option<Uuid> {
        Some(self.id)
    }
}
