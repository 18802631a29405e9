//! Punch records.

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceResult, company_for_create, company_for_update, delete_scoped,
    find_scoped, in_utc, is_taken, list_scoped, now, reference_in_company, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::attendance_log::{self, InOutStatus, PunchMode, VerificationMethod};
use crate::models::{AttendanceLog, Device, Employee};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors, normalize_opt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceLogInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub punch_datetime: Option<DateTimeWithTimeZone>,
    pub in_out_status: Option<InOutStatus>,
    pub verification_method: Option<VerificationMethod>,
    pub punch_mode: Option<PunchMode>,
    pub work_code: Option<String>,
    pub sync: Option<bool>,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

struct PunchFields {
    employee_id: Uuid,
    device_id: Option<Uuid>,
    punch_datetime: DateTimeWithTimeZone,
    in_out_status: InOutStatus,
    verification_method: VerificationMethod,
    punch_mode: PunchMode,
    work_code: Option<String>,
    sync: bool,
    location_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl AttendanceLogInput {
    fn check(self) -> Result<PunchFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let employee_id = required(&mut errors, "employee_id", self.employee_id);

        let work_code = normalize_opt(self.work_code);
        errors.check_opt_len("work_code", work_code.as_deref(), 20);
        let location_name = normalize_opt(self.location_name);
        errors.check_opt_len("location_name", location_name.as_deref(), 255);

        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                errors.check_range("latitude", latitude, -90.0, 90.0);
                errors.check_range("longitude", longitude, -180.0, 180.0);
            }
            (None, None) => {}
            _ => errors.add_non_field("Both latitude and longitude must be provided together."),
        }

        let Some(employee_id) = employee_id else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(PunchFields {
            employee_id,
            device_id: self.device_id,
            punch_datetime: self.punch_datetime.map(in_utc).unwrap_or_else(now),
            in_out_status: self.in_out_status.unwrap_or_default(),
            verification_method: self.verification_method.unwrap_or_default(),
            punch_mode: self.punch_mode.unwrap_or_default(),
            work_code,
            sync: self.sync.unwrap_or(false),
            location_name,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceLogService;

impl AttendanceLogService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: AttendanceLogInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<PunchFields> {
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
        if let Some(device_id) = fields.device_id {
            reference_in_company::<Device, _>(conn, &mut errors, "device_id", device_id, company_id)
                .await?;
        }

        if is_taken::<AttendanceLog, _>(
            conn,
            Condition::all()
                .add(attendance_log::Column::EmployeeId.eq(fields.employee_id))
                .add(attendance_log::Column::PunchDatetime.eq(fields.punch_datetime)),
            attendance_log::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(
                NON_FIELD_ERRORS,
                "The fields employee, punch_datetime must make a unique set.",
            );
        }

        errors.finish()?;
        Ok(fields)
    }

    fn apply(active: &mut attendance_log::ActiveModel, fields: PunchFields) {
        active.employee_id = Set(fields.employee_id);
        active.device_id = Set(fields.device_id);
        active.punch_datetime = Set(fields.punch_datetime);
        active.in_out_status = Set(fields.in_out_status);
        active.verification_method = Set(fields.verification_method);
        active.punch_mode = Set(fields.punch_mode);
        active.work_code = Set(fields.work_code);
        active.sync = Set(fields.sync);
        active.location_name = Set(fields.location_name);
        active.latitude = Set(fields.latitude);
        active.longitude = Set(fields.longitude);
    }

    /// Punches of one employee, newest first. The employee must be visible to the caller.
    pub async fn list_for_employee(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        employee_id: Uuid,
    ) -> ServiceResult<Vec<attendance_log::Model>> {
        let employee = find_scoped::<Employee, _>(db, caller, EntityKind::Employee, employee_id).await?;

        Ok(AttendanceLog::find()
            .filter(attendance_log::Column::EmployeeId.eq(employee.id))
            .filter(attendance_log::Column::CompanyId.eq(employee.company_id))
            .order_by_desc(attendance_log::Column::PunchDatetime)
            .all(db)
            .await?)
    }
}

#[async_trait]
impl RecordService for AttendanceLogService {
    const KIND: EntityKind = EntityKind::AttendanceLog;

    type Record = attendance_log::Model;
    type Input = AttendanceLogInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<attendance_log::Model>> {
        list_scoped::<AttendanceLog>(
            db,
            caller,
            attendance_log::Column::CompanyId,
            attendance_log::Column::PunchDatetime,
        )
        .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<attendance_log::Model> {
        find_scoped::<AttendanceLog, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: AttendanceLogInput,
    ) -> ServiceResult<attendance_log::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = attendance_log::ActiveModel {
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
            log_id = %model.id,
            employee_id = %model.employee_id,
            status = ?model.in_out_status,
            "Punch recorded"
        );
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: AttendanceLogInput,
    ) -> ServiceResult<attendance_log::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<AttendanceLog, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: attendance_log::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<AttendanceLog>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<AttendanceLogInput> {
        let model = find_scoped::<AttendanceLog, _>(db, caller, Self::KIND, id).await?;
        Ok(AttendanceLogInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            device_id: model.device_id,
            punch_datetime: Some(model.punch_datetime),
            in_out_status: Some(model.in_out_status),
            verification_method: Some(model.verification_method),
            punch_mode: Some(model.punch_mode),
            work_code: model.work_code,
            sync: Some(model.sync),
            location_name: model.location_name,
            latitude: model.latitude,
            longitude: model.longitude,
        })
    }
}
