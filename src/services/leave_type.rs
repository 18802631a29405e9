//! Kinds of leave a company grants.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    REFERENCED_MOVE, RecordService, ServiceResult, company_for_create, company_for_update,
    delete_scoped, find_scoped, is_referenced, is_taken, list_scoped, now, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::{
    LeaveBalance, LeaveRequest, LeaveType, leave_balance, leave_request, leave_type,
};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveTypeInput {
    pub company_id: Option<Uuid>,
    pub name: Option<String>,
    pub days_per_year: Option<i32>,
    pub is_paid: Option<bool>,
}

struct LeaveTypeFields {
    name: String,
    days_per_year: i32,
    is_paid: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveTypeService;

impl LeaveTypeService {
    /// Whether a balance or a request is kept against this leave type.
    async fn has_dependents<C: ConnectionTrait>(conn: &C, id: Uuid) -> ServiceResult<bool> {
        Ok(
            is_referenced::<LeaveBalance, _>(conn, leave_balance::Column::LeaveTypeId, id).await?
                || is_referenced::<LeaveRequest, _>(conn, leave_request::Column::LeaveTypeId, id)
                    .await?,
        )
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: LeaveTypeInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<LeaveTypeFields> {
        let mut errors = ValidationErrors::new();

        let name = required(&mut errors, "name", input.name.map(|n| n.trim().to_string()));
        if let Some(name) = &name {
            errors.check_len("name", name, 1, 50);
        }
        let days_per_year = input.days_per_year.unwrap_or(0);
        errors.check_min("days_per_year", days_per_year, 0);

        let Some(name) = name else {
            return Err(errors.into());
        };
        if is_taken::<LeaveType, _>(
            conn,
            Condition::all()
                .add(leave_type::Column::CompanyId.eq(company_id))
                .add(leave_type::Column::Name.eq(name.as_str())),
            leave_type::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("name", "A leave type with this name already exists in the company.");
        }

        errors.finish()?;
        Ok(LeaveTypeFields {
            name,
            days_per_year,
            is_paid: input.is_paid.unwrap_or(true),
        })
    }
}

#[async_trait]
impl RecordService for LeaveTypeService {
    const KIND: EntityKind = EntityKind::LeaveType;

    type Record = leave_type::Model;
    type Input = LeaveTypeInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<leave_type::Model>> {
        list_scoped::<LeaveType>(db, caller, leave_type::Column::CompanyId, leave_type::Column::Name)
            .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<leave_type::Model> {
        find_scoped::<LeaveType, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: LeaveTypeInput,
    ) -> ServiceResult<leave_type::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let model = leave_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(fields.name),
            days_per_year: Set(fields.days_per_year),
            is_paid: Set(fields.is_paid),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(leave_type_id = %model.id, name = %model.name, "Leave type created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: LeaveTypeInput,
    ) -> ServiceResult<leave_type::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<LeaveType, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        if company_id != existing.company_id && Self::has_dependents(&txn, id).await? {
            return Err(ValidationErrors::single("company_id", REFERENCED_MOVE).into());
        }
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: leave_type::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        active.name = Set(fields.name);
        active.days_per_year = Set(fields.days_per_year);
        active.is_paid = Set(fields.is_paid);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<LeaveType>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<LeaveTypeInput> {
        let model = find_scoped::<LeaveType, _>(db, caller, Self::KIND, id).await?;
        Ok(LeaveTypeInput {
            company_id: Some(model.company_id),
            name: Some(model.name),
            days_per_year: Some(model.days_per_year),
            is_paid: Some(model.is_paid),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use crate::services::test_support::{insert_company, setup_db};

    #[tokio::test]
    async fn test_defaults_and_negative_days() {
        let db = setup_db().await;
        let member = Caller::test_member(insert_company(&db, "Company Alpha").await);

        let annual = LeaveTypeService
            .create(
                &db,
                &member,
                LeaveTypeInput {
                    name: Some("Annual".to_string()),
                    ..LeaveTypeInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(annual.days_per_year, 0);
        assert!(annual.is_paid);

        let result = LeaveTypeService
            .create(
                &db,
                &member,
                LeaveTypeInput {
                    name: Some("Sick".to_string()),
                    days_per_year: Some(-3),
                    ..LeaveTypeInput::default()
                },
            )
            .await;
        match result {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("days_per_year")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
