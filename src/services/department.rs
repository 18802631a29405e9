//! Departments of a company.

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
use crate::models::{Department, Employee, department, employee};
use crate::validation::{ValidationErrors, normalize_opt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentInput {
    pub company_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
}

struct DepartmentFields {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepartmentService;

impl DepartmentService {
    async fn has_dependents<C: ConnectionTrait>(conn: &C, id: Uuid) -> ServiceResult<bool> {
        is_referenced::<Employee, _>(conn, employee::Column::DepartmentId, id).await
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: DepartmentInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<DepartmentFields> {
        let mut errors = ValidationErrors::new();

        let name = required(&mut errors, "name", input.name.map(|n| n.trim().to_string()));
        if let Some(name) = &name {
            errors.check_len("name", name, 1, 50);
        }
        let description = normalize_opt(input.description);
        errors.check_opt_len("description", description.as_deref(), 255);

        let Some(name) = name else {
            return Err(errors.into());
        };
        if is_taken::<Department, _>(
            conn,
            Condition::all()
                .add(department::Column::CompanyId.eq(company_id))
                .add(department::Column::Name.eq(name.as_str())),
            department::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("name", "A department with this name already exists in the company.");
        }

        errors.finish()?;
        Ok(DepartmentFields { name, description })
    }
}

#[async_trait]
impl RecordService for DepartmentService {
    const KIND: EntityKind = EntityKind::Department;

    type Record = department::Model;
    type Input = DepartmentInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<department::Model>> {
        list_scoped::<Department>(
            db,
            caller,
            department::Column::CompanyId,
            department::Column::Name,
        )
        .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<department::Model> {
        find_scoped::<Department, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: DepartmentInput,
    ) -> ServiceResult<department::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let model = department::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(fields.name),
            description: Set(fields.description),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(department_id = %model.id, company_id = %company_id, "Department created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: DepartmentInput,
    ) -> ServiceResult<department::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Department, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        if company_id != existing.company_id && Self::has_dependents(&txn, id).await? {
            return Err(ValidationErrors::single("company_id", REFERENCED_MOVE).into());
        }
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: department::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        active.name = Set(fields.name);
        active.description = Set(fields.description);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Department>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<DepartmentInput> {
        let model = find_scoped::<Department, _>(db, caller, Self::KIND, id).await?;
        Ok(DepartmentInput {
            company_id: Some(model.company_id),
            name: Some(model.name),
            description: model.description,
        })
    }
}
