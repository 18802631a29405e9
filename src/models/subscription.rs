//! Subscription entity model
//!
//! Subscription plans are global (not tenant-scoped) and cap how many
//! employees a company may register.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Plan tier of a subscription.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    #[sea_orm(string_value = "FREE")]
    Free,
    #[sea_orm(string_value = "BASIC")]
    Basic,
    #[sea_orm(string_value = "PREMIUM")]
    Premium,
    #[sea_orm(string_value = "ENTERPRISE")]
    Enterprise,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Plan tier (unique)
    #[sea_orm(unique)]
    pub plan: Plan,

    /// Monthly price
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    /// Maximum number of employees a subscribed company may register
    pub max_employees: i32,

    pub max_storage_mb: i64,

    /// Feature flags, e.g. `{"gps_punch": true}`
    #[sea_orm(column_type = "JsonBinary")]
    pub features: Json,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::company::Entity")]
    Company,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
