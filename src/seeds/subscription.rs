//! Subscription plan seeding
//!
//! Inserts the default plan catalogue. Plans that already exist are left
//! untouched, so running the seed twice is harmless.

use anyhow::Result;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use uuid::Uuid;

use crate::models::subscription::{self, Plan};
use crate::models::Subscription;

/// Default price, limits and feature flags of one plan
struct PlanConfig {
    plan: Plan,
    price: Decimal,
    max_employees: i32,
    max_storage_mb: i64,
    features: serde_json::Value,
}

fn default_plans() -> Vec<PlanConfig> {
    vec![
        PlanConfig {
            plan: Plan::Free,
            price: Decimal::ZERO,
            max_employees: 10,
            max_storage_mb: 100,
            features: json!({"gps_punch": false, "leave_management": false}),
        },
        PlanConfig {
            plan: Plan::Basic,
            price: Decimal::new(1900, 2),
            max_employees: 50,
            max_storage_mb: 1024,
            features: json!({"gps_punch": false, "leave_management": true}),
        },
        PlanConfig {
            plan: Plan::Premium,
            price: Decimal::new(4900, 2),
            max_employees: 250,
            max_storage_mb: 10240,
            features: json!({"gps_punch": true, "leave_management": true}),
        },
        PlanConfig {
            plan: Plan::Enterprise,
            price: Decimal::new(19900, 2),
            max_employees: 5000,
            max_storage_mb: 102400,
            features: json!({"gps_punch": true, "leave_management": true, "priority_support": true}),
        },
    ]
}

/// Seeds the subscriptions table with the default plans.
///
/// Returns the number of plans inserted.
pub async fn seed_subscriptions(db: &DatabaseConnection) -> Result<usize> {
    let mut inserted = 0;

    for config in default_plans() {
        let existing = Subscription::find()
            .filter(subscription::Column::Plan.eq(config.plan))
            .one(db)
            .await?;
        if existing.is_some() {
            log::info!("Subscription plan '{:?}' already exists, skipping", config.plan);
            continue;
        }

        log::info!("Creating subscription plan: {:?}", config.plan);
        let now = chrono::Utc::now().fixed_offset();
        subscription::ActiveModel {
            id: Set(Uuid::new_v4()),
            plan: Set(config.plan),
            price: Set(config.price),
            max_employees: Set(config.max_employees),
            max_storage_mb: Set(config.max_storage_mb),
            features: Set(config.features),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            log::error!("Failed to create subscription plan '{:?}': {}", config.plan, e);
            e
        })?;
        inserted += 1;
    }

    log::info!("Subscription seeding completed successfully");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::setup_db;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let db = setup_db().await;

        assert_eq!(seed_subscriptions(&db).await.unwrap(), 4);
        assert_eq!(seed_subscriptions(&db).await.unwrap(), 0);
        assert_eq!(Subscription::find().count(&db).await.unwrap(), 4);
    }

    #[test]
    fn test_plan_limits_grow_with_tier() {
        let plans = default_plans();
        assert!(plans
            .windows(2)
            .all(|pair| pair[0].max_employees < pair[1].max_employees));
    }
}
