//! Daily worked time.

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceResult, company_for_create, company_for_update, delete_scoped,
    find_scoped, is_taken, list_scoped, now, reference_in_company, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::{Employee, WorkHours, work_hours};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors};

/// Minutes in a day.
const MAX_DAILY_MINUTES: i32 = 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkHoursInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub total_minutes: Option<i32>,
    pub overtime_minutes: Option<i32>,
}

struct WorkHoursFields {
    employee_id: Uuid,
    date: NaiveDate,
    total_minutes: i32,
    overtime_minutes: Option<i32>,
}

impl WorkHoursInput {
    fn check(self) -> Result<WorkHoursFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let employee_id = required(&mut errors, "employee_id", self.employee_id);
        let date = required(&mut errors, "date", self.date);
        let total_minutes = required(&mut errors, "total_minutes", self.total_minutes);

        if let Some(total) = total_minutes {
            errors.check_range("total_minutes", total, 0, MAX_DAILY_MINUTES);
        }
        if let Some(overtime) = self.overtime_minutes {
            errors.check_min("overtime_minutes", overtime, 0);
            if total_minutes.is_some_and(|total| overtime > total) {
                errors.add(
                    "overtime_minutes",
                    "Overtime cannot exceed the total minutes worked.",
                );
            }
        }

        let (Some(employee_id), Some(date), Some(total_minutes)) =
            (employee_id, date, total_minutes)
        else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(WorkHoursFields {
            employee_id,
            date,
            total_minutes,
            overtime_minutes: self.overtime_minutes,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkHoursService;

impl WorkHoursService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: WorkHoursInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<WorkHoursFields> {
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
        if is_taken::<WorkHours, _>(
            conn,
            Condition::all()
                .add(work_hours::Column::EmployeeId.eq(fields.employee_id))
                .add(work_hours::Column::Date.eq(fields.date)),
            work_hours::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(NON_FIELD_ERRORS, "The fields employee, date must make a unique set.");
        }

        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut work_hours::ActiveModel, fields: WorkHoursFields) {
        active.employee_id = Set(fields.employee_id);
        active.date = Set(fields.date);
        active.total_minutes = Set(fields.total_minutes);
        active.overtime_minutes = Set(fields.overtime_minutes);
    }
}

#[async_trait]
impl RecordService for WorkHoursService {
    const KIND: EntityKind = EntityKind::WorkHours;

    type Record = work_hours::Model;
    type Input = WorkHoursInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<work_hours::Model>> {
        list_scoped::<WorkHours>(db, caller, work_hours::Column::CompanyId, work_hours::Column::Date)
            .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<work_hours::Model> {
        find_scoped::<WorkHours, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: WorkHoursInput,
    ) -> ServiceResult<work_hours::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = work_hours::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::apply(&mut active, fields);
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::debug!(
            work_hours_id = %model.id,
            employee_id = %model.employee_id,
            date = %model.date,
            "Work hours recorded"
        );
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: WorkHoursInput,
    ) -> ServiceResult<work_hours::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<WorkHours, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: work_hours::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<WorkHours>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<WorkHoursInput> {
        let model = find_scoped::<WorkHours, _>(db, caller, Self::KIND, id).await?;
        Ok(WorkHoursInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            date: Some(model.date),
            total_minutes: Some(model.total_minutes),
            overtime_minutes: model.overtime_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(total: i32, overtime: Option<i32>) -> WorkHoursInput {
        WorkHoursInput {
            employee_id: Some(Uuid::new_v4()),
            date: NaiveDate::from_ymd_opt(2024, 3, 4),
            total_minutes: Some(total),
            overtime_minutes: overtime,
            ..WorkHoursInput::default()
        }
    }

    #[test]
    fn test_total_minutes_fit_in_a_day() {
        assert!(day(1440, None).check().is_ok());
        assert!(day(1441, None).check().err().unwrap().has("total_minutes"));
        assert!(day(-1, None).check().err().unwrap().has("total_minutes"));
    }

    #[test]
    fn test_overtime_bounded_by_total() {
        assert!(day(600, Some(120)).check().is_ok());

        let errors = day(300, Some(301)).check().err().unwrap();
        assert_eq!(
            errors.errors()[0].error,
            "Overtime cannot exceed the total minutes worked."
        );
        assert!(day(300, Some(-5)).check().err().unwrap().has("overtime_minutes"));
    }
}
