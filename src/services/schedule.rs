//! Shift assignments.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceError, ServiceResult, company_for_create, company_for_update,
    delete_scoped, find_scoped, list_scoped, now, reference_in_company, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::schedule::{self, Workday};
use crate::models::{Employee, Schedule, Shift};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub workdays: Option<Vec<Workday>>,
}

struct ScheduleFields {
    employee_id: Uuid,
    shift_id: Uuid,
    workdays: Vec<Workday>,
}

impl ScheduleInput {
    fn check(self) -> Result<ScheduleFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let employee_id = required(&mut errors, "employee_id", self.employee_id);
        let shift_id = required(&mut errors, "shift_id", self.shift_id);
        let workdays = required(&mut errors, "workdays", self.workdays);

        if let Some(days) = &workdays {
            let distinct: BTreeSet<_> = days.iter().collect();
            if days.is_empty() {
                errors.add("workdays", "Select at least one workday.");
            } else if distinct.len() != days.len() {
                errors.add("workdays", "Workdays must not contain duplicates.");
            }
        }

        let (Some(employee_id), Some(shift_id), Some(workdays)) = (employee_id, shift_id, workdays)
        else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(ScheduleFields {
            employee_id,
            shift_id,
            workdays,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleService;

impl ScheduleService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: ScheduleInput,
    ) -> ServiceResult<ScheduleFields> {
        let fields = input.check()?;
        let mut errors = ValidationErrors::new();
        reference_in_company::<Employee, _>(
            conn,
            &mut errors,
            "employee_id",
            fields.employee_id,
            company_id,
        )
        .await?;
        reference_in_company::<Shift, _>(conn, &mut errors, "shift_id", fields.shift_id, company_id)
            .await?;
        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut schedule::ActiveModel, fields: ScheduleFields) -> ServiceResult<()> {
        let workdays = serde_json::to_value(&fields.workdays)
            .map_err(|e| ServiceError::Internal(anyhow::Error::from(e)))?;
        active.employee_id = Set(fields.employee_id);
        active.shift_id = Set(fields.shift_id);
        active.workdays = Set(workdays);
        Ok(())
    }
}

#[async_trait]
impl RecordService for ScheduleService {
    const KIND: EntityKind = EntityKind::Schedule;

    type Record = schedule::Model;
    type Input = ScheduleInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<schedule::Model>> {
        list_scoped::<Schedule>(
            db,
            caller,
            schedule::Column::CompanyId,
            schedule::Column::CreatedAt,
        )
        .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<schedule::Model> {
        find_scoped::<Schedule, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: ScheduleInput,
    ) -> ServiceResult<schedule::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input).await?;

        let now = now();
        let mut active = schedule::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::apply(&mut active, fields)?;
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            schedule_id = %model.id,
            employee_id = %model.employee_id,
            shift_id = %model.shift_id,
            "Schedule created"
        );
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: ScheduleInput,
    ) -> ServiceResult<schedule::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Schedule, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input).await?;

        let mut active: schedule::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields)?;
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Schedule>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<ScheduleInput> {
        let model = find_scoped::<Schedule, _>(db, caller, Self::KIND, id).await?;
        Ok(ScheduleInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            shift_id: Some(model.shift_id),
            workdays: Some(model.workday_list()),
        })
    }
}
