//! Yearly leave allowances.

use async_trait::async_trait;
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
use crate::models::{Employee, LeaveBalance, LeaveType, leave_balance};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors};

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveBalanceInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub leave_type_id: Option<Uuid>,
    pub year: Option<i32>,
    pub allocated_days: Option<i32>,
    pub used_days: Option<i32>,
}

/// A balance as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveBalanceRecord {
    #[serde(flatten)]
    pub balance: leave_balance::Model,
    pub remaining_days: i32,
}

impl From<leave_balance::Model> for LeaveBalanceRecord {
    fn from(balance: leave_balance::Model) -> Self {
        let remaining_days = balance.remaining_days();
        Self {
            balance,
            remaining_days,
        }
    }
}

struct BalanceFields {
    employee_id: Uuid,
    leave_type_id: Uuid,
    year: i32,
    allocated_days: i32,
    used_days: i32,
}

impl LeaveBalanceInput {
    fn check(self) -> Result<BalanceFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let employee_id = required(&mut errors, "employee_id", self.employee_id);
        let leave_type_id = required(&mut errors, "leave_type_id", self.leave_type_id);
        let year = required(&mut errors, "year", self.year);
        if let Some(year) = year {
            errors.check_range("year", year, MIN_YEAR, MAX_YEAR);
        }

        let allocated_days = self.allocated_days.unwrap_or(0);
        let used_days = self.used_days.unwrap_or(0);
        errors.check_min("allocated_days", allocated_days, 0);
        errors.check_min("used_days", used_days, 0);
        if used_days > allocated_days {
            errors.add("used_days", "Used days cannot exceed allocated days.");
        }

        let (Some(employee_id), Some(leave_type_id), Some(year)) =
            (employee_id, leave_type_id, year)
        else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(BalanceFields {
            employee_id,
            leave_type_id,
            year,
            allocated_days,
            used_days,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveBalanceService;

impl LeaveBalanceService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: LeaveBalanceInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<BalanceFields> {
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
        reference_in_company::<LeaveType, _>(
            conn,
            &mut errors,
            "leave_type_id",
            fields.leave_type_id,
            company_id,
        )
        .await?;

        if is_taken::<LeaveBalance, _>(
            conn,
            Condition::all()
                .add(leave_balance::Column::EmployeeId.eq(fields.employee_id))
                .add(leave_balance::Column::LeaveTypeId.eq(fields.leave_type_id))
                .add(leave_balance::Column::Year.eq(fields.year)),
            leave_balance::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(
                NON_FIELD_ERRORS,
                "The fields employee, leave_type, year must make a unique set.",
            );
        }

        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut leave_balance::ActiveModel, fields: BalanceFields) {
        active.employee_id = Set(fields.employee_id);
        active.leave_type_id = Set(fields.leave_type_id);
        active.year = Set(fields.year);
        active.allocated_days = Set(fields.allocated_days);
        active.used_days = Set(fields.used_days);
    }
}

#[async_trait]
impl RecordService for LeaveBalanceService {
    const KIND: EntityKind = EntityKind::LeaveBalance;

    type Record = LeaveBalanceRecord;
    type Input = LeaveBalanceInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<LeaveBalanceRecord>> {
        let balances = list_scoped::<LeaveBalance>(
            db,
            caller,
            leave_balance::Column::CompanyId,
            leave_balance::Column::Year,
        )
        .await?;
        Ok(balances.into_iter().map(LeaveBalanceRecord::from).collect())
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<LeaveBalanceRecord> {
        Ok(find_scoped::<LeaveBalance, _>(db, caller, Self::KIND, id).await?.into())
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: LeaveBalanceInput,
    ) -> ServiceResult<LeaveBalanceRecord> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = leave_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::apply(&mut active, fields);
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(
            leave_balance_id = %model.id,
            employee_id = %model.employee_id,
            year = model.year,
            "Leave balance created"
        );
        Ok(model.into())
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: LeaveBalanceInput,
    ) -> ServiceResult<LeaveBalanceRecord> {
        let txn = db.begin().await?;
        let existing = find_scoped::<LeaveBalance, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: leave_balance::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model.into())
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<LeaveBalance>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<LeaveBalanceInput> {
        let model = find_scoped::<LeaveBalance, _>(db, caller, Self::KIND, id).await?;
        Ok(LeaveBalanceInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            leave_type_id: Some(model.leave_type_id),
            year: Some(model.year),
            allocated_days: Some(model.allocated_days),
            used_days: Some(model.used_days),
        })
    }
}
