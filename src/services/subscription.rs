//! Subscription plans. Global records: readable by anyone holding the view
//! capability, writable only by superusers.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RecordService, ServiceError, ServiceResult, is_taken, now, required};
use crate::access::{Caller, EntityKind};
use crate::models::subscription::{self, Plan};
use crate::models::{Company, Subscription};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionInput {
    pub plan: Option<Plan>,
    pub price: Option<Decimal>,
    pub max_employees: Option<i32>,
    pub max_storage_mb: Option<i64>,
    pub features: Option<serde_json::Value>,
}

struct SubscriptionFields {
    plan: Plan,
    price: Decimal,
    max_employees: i32,
    max_storage_mb: i64,
    features: serde_json::Value,
}

impl SubscriptionInput {
    fn check(self) -> Result<SubscriptionFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let plan = required(&mut errors, "plan", self.plan);
        let price = required(&mut errors, "price", self.price);
        if let Some(price) = price {
            errors.check_min("price", price, Decimal::ZERO);
        }
        let max_employees = required(&mut errors, "max_employees", self.max_employees);
        if let Some(max) = max_employees {
            errors.check_min("max_employees", max, 1);
        }
        let max_storage_mb = self.max_storage_mb.unwrap_or(0);
        errors.check_min("max_storage_mb", max_storage_mb, 0);

        let features = self
            .features
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        match features.as_object() {
            Some(flags) if flags.values().all(serde_json::Value::is_boolean) => {}
            _ => errors.add("features", "Features must be an object of boolean flags."),
        }

        let (Some(plan), Some(price), Some(max_employees)) = (plan, price, max_employees) else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(SubscriptionFields {
            plan,
            price,
            max_employees,
            max_storage_mb,
            features,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionService;

impl SubscriptionService {
    fn ensure_superuser(caller: &Caller) -> ServiceResult<()> {
        if caller.is_superuser {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "Only superusers can manage subscriptions.".to_string(),
            ))
        }
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        input: SubscriptionInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<SubscriptionFields> {
        let fields = input.check()?;
        if is_taken::<Subscription, _>(
            conn,
            Condition::all().add(subscription::Column::Plan.eq(fields.plan)),
            subscription::Column::Id,
            exclude,
        )
        .await?
        {
            return Err(ValidationErrors::single(
                "plan",
                "Subscription with this plan already exists.",
            )
            .into());
        }
        Ok(fields)
    }

    async fn find(db: &DatabaseConnection, id: Uuid) -> ServiceResult<subscription::Model> {
        Subscription::find_by_id(id)
            .one(db)
            .await?
            .ok_or(ServiceError::NotFound(Self::KIND.label()))
    }
}

#[async_trait]
impl RecordService for SubscriptionService {
    const KIND: EntityKind = EntityKind::Subscription;

    type Record = subscription::Model;
    type Input = SubscriptionInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        _caller: &Caller,
    ) -> ServiceResult<Vec<subscription::Model>> {
        Ok(Subscription::find()
            .order_by_asc(subscription::Column::MaxEmployees)
            .all(db)
            .await?)
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        _caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<subscription::Model> {
        Self::find(db, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: SubscriptionInput,
    ) -> ServiceResult<subscription::Model> {
        Self::ensure_superuser(caller)?;

        let txn = db.begin().await?;
        let fields = Self::validate(&txn, input, None).await?;
        let now = now();
        let model = subscription::ActiveModel {
            id: Set(Uuid::new_v4()),
            plan: Set(fields.plan),
            price: Set(fields.price),
            max_employees: Set(fields.max_employees),
            max_storage_mb: Set(fields.max_storage_mb),
            features: Set(fields.features),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(subscription_id = %model.id, plan = ?model.plan, "Subscription created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: SubscriptionInput,
    ) -> ServiceResult<subscription::Model> {
        Self::ensure_superuser(caller)?;

        let txn = db.begin().await?;
        let existing = Subscription::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::NotFound(Self::KIND.label()))?;
        let fields = Self::validate(&txn, input, Some(id)).await?;

        let mut active: subscription::ActiveModel = existing.into();
        active.plan = Set(fields.plan);
        active.price = Set(fields.price);
        active.max_employees = Set(fields.max_employees);
        active.max_storage_mb = Set(fields.max_storage_mb);
        active.features = Set(fields.features);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        Self::ensure_superuser(caller)?;

        let txn = db.begin().await?;
        Subscription::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::NotFound(Self::KIND.label()))?;
        Subscription::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(subscription_id = %id, "Subscription deleted");
        Ok(())
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        _caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<SubscriptionInput> {
        let model = Self::find(db, id).await?;
        Ok(SubscriptionInput {
            plan: Some(model.plan),
            price: Some(model.price),
            max_employees: Some(model.max_employees),
            max_storage_mb: Some(model.max_storage_mb),
            features: Some(model.features),
        })
    }
}

/// Employee cap of a company: its own override, else its plan's limit.
pub(crate) async fn effective_employee_limit<C: ConnectionTrait>(
    conn: &C,
    company_id: Uuid,
) -> ServiceResult<Option<i32>> {
    let Some(company) = Company::find_by_id(company_id).one(conn).await? else {
        return Ok(None);
    };
    if company.employee_limit.is_some() {
        return Ok(company.employee_limit);
    }
    let Some(subscription_id) = company.subscription_id else {
        return Ok(None);
    };
    Ok(Subscription::find_by_id(subscription_id)
        .one(conn)
        .await?
        .map(|plan| plan.max_employees))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{root, setup_db};

    fn basic() -> SubscriptionInput {
        SubscriptionInput {
            plan: Some(Plan::Basic),
            price: Some(Decimal::new(20, 0)),
            max_employees: Some(25),
            max_storage_mb: Some(512),
            features: Some(serde_json::json!({"gps_punch": true})),
        }
    }

    #[test]
    fn test_check_reports_every_problem() {
        let input = SubscriptionInput {
            price: Some(Decimal::new(-1, 0)),
            max_employees: Some(0),
            features: Some(serde_json::json!({"gps_punch": "yes"})),
            ..SubscriptionInput::default()
        };
        let errors = input.check().err().unwrap();
        assert!(errors.has("plan"));
        assert!(errors.has("price"));
        assert!(errors.has("max_employees"));
        assert!(errors.has("features"));
    }

    #[tokio::test]
    async fn test_plan_is_unique() {
        let db = setup_db().await;
        let service = SubscriptionService;
        service.create(&db, &root(), basic()).await.unwrap();

        match service.create(&db, &root(), basic()).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("plan")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_members_cannot_write_plans() {
        let db = setup_db().await;
        let member = Caller::test_member(Uuid::new_v4());
        assert!(matches!(
            SubscriptionService.create(&db, &member, basic()).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }
}
