//! Leave requests.

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
use crate::models::leave_request::{self, LeaveStatus};
use crate::models::{Employee, LeaveRequest, LeaveType};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors, normalize_opt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRequestInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub leave_type_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub status: Option<LeaveStatus>,
}

/// A leave request as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct LeaveRequestRecord {
    #[serde(flatten)]
    pub request: leave_request::Model,
    pub days: i64,
}

impl From<leave_request::Model> for LeaveRequestRecord {
    fn from(request: leave_request::Model) -> Self {
        let days = request.days();
        Self { request, days }
    }
}

struct RequestFields {
    employee_id: Uuid,
    leave_type_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: Option<String>,
    status: LeaveStatus,
}

impl LeaveRequestInput {
    fn check(self) -> Result<RequestFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let employee_id = required(&mut errors, "employee_id", self.employee_id);
        let leave_type_id = required(&mut errors, "leave_type_id", self.leave_type_id);
        let start_date = required(&mut errors, "start_date", self.start_date);
        let end_date = required(&mut errors, "end_date", self.end_date);
        if let (Some(start), Some(end)) = (start_date, end_date)
            && start > end
        {
            errors.add_non_field("Start date must be on or before the end date.");
        }

        let reason = normalize_opt(self.reason);
        errors.check_opt_len("reason", reason.as_deref(), 500);

        let (Some(employee_id), Some(leave_type_id), Some(start_date), Some(end_date)) =
            (employee_id, leave_type_id, start_date, end_date)
        else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(RequestFields {
            employee_id,
            leave_type_id,
            start_date,
            end_date,
            reason,
            status: self.status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveRequestService;

impl LeaveRequestService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: LeaveRequestInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<RequestFields> {
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

        if fields.status.is_blocking()
            && is_taken::<LeaveRequest, _>(
                conn,
                Condition::all()
                    .add(leave_request::Column::EmployeeId.eq(fields.employee_id))
                    .add(
                        leave_request::Column::Status
                            .is_in([LeaveStatus::Pending, LeaveStatus::Approved]),
                    )
                    .add(leave_request::Column::StartDate.lte(fields.end_date))
                    .add(leave_request::Column::EndDate.gte(fields.start_date)),
                leave_request::Column::Id,
                exclude,
            )
            .await?
        {
            errors.add(
                NON_FIELD_ERRORS,
                "This leave overlaps another pending or approved leave request.",
            );
        }

        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut leave_request::ActiveModel, fields: RequestFields) {
        active.employee_id = Set(fields.employee_id);
        active.leave_type_id = Set(fields.leave_type_id);
        active.start_date = Set(fields.start_date);
        active.end_date = Set(fields.end_date);
        active.reason = Set(fields.reason);
        active.status = Set(fields.status);
    }
}

#[async_trait]
impl RecordService for LeaveRequestService {
    const KIND: EntityKind = EntityKind::LeaveRequest;

    type Record = LeaveRequestRecord;
    type Input = LeaveRequestInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<LeaveRequestRecord>> {
        let requests = list_scoped::<LeaveRequest>(
            db,
            caller,
            leave_request::Column::CompanyId,
            leave_request::Column::StartDate,
        )
        .await?;
        Ok(requests.into_iter().map(LeaveRequestRecord::from).collect())
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<LeaveRequestRecord> {
        Ok(find_scoped::<LeaveRequest, _>(db, caller, Self::KIND, id).await?.into())
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: LeaveRequestInput,
    ) -> ServiceResult<LeaveRequestRecord> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = leave_request::ActiveModel {
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
            leave_request_id = %model.id,
            employee_id = %model.employee_id,
            start_date = %model.start_date,
            end_date = %model.end_date,
            "Leave requested"
        );
        Ok(model.into())
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: LeaveRequestInput,
    ) -> ServiceResult<LeaveRequestRecord> {
        let txn = db.begin().await?;
        let existing = find_scoped::<LeaveRequest, _>(&txn, caller, Self::KIND, id).await?;
        let previous_status = existing.status;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: leave_request::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        if model.status != previous_status {
            tracing::info!(
                leave_request_id = %model.id,
                from = ?previous_status,
                to = ?model.status,
                "Leave request status changed"
            );
        }
        Ok(model.into())
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<LeaveRequest>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<LeaveRequestInput> {
        let model = find_scoped::<LeaveRequest, _>(db, caller, Self::KIND, id).await?;
        Ok(LeaveRequestInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            leave_type_id: Some(model.leave_type_id),
            start_date: Some(model.start_date),
            end_date: Some(model.end_date),
            reason: model.reason,
            status: Some(model.status),
        })
    }
}
