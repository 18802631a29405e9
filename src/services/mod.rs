//! # Record Services
//!
//! One service per record kind. Every service runs the same pipeline:
//! tenant scope, validation, then a single store transaction. The permission
//! gate runs before a service is called (see [`crate::handlers::records`]).

pub mod attendance_log;
pub mod company;
pub mod department;
pub mod device;
pub mod employee;
pub mod holiday;
pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod notice;
pub mod schedule;
pub mod shift;
pub mod subscription;
pub mod user;
pub mod work_hours;

pub use attendance_log::AttendanceLogService;
pub use company::CompanyService;
pub use department::DepartmentService;
pub use device::DeviceService;
pub use employee::EmployeeService;
pub use holiday::HolidayService;
pub use leave_balance::LeaveBalanceService;
pub use leave_request::LeaveRequestService;
pub use leave_type::LeaveTypeService;
pub use notice::NoticeService;
pub use schedule::ScheduleService;
pub use shift::ShiftService;
pub use subscription::SubscriptionService;
pub use user::UserService;
pub use work_hours::WorkHoursService;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PrimaryKeyTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::access::{Caller, EntityKind, TenantOwned};
use crate::models::Company;
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors};

/// Failure of a service operation, rendered by [`crate::error::ApiError`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("store error: {0}")]
    Store(#[from] DbErr),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Message for a reference to a missing or foreign record.
pub fn invalid_pk(id: Uuid) -> String {
    format!("Invalid pk \"{id}\" - object does not exist.")
}

pub(crate) const REQUIRED: &str = "This field is required.";

pub(crate) fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// Same instant expressed at offset zero, so stored text compares and sorts by time.
pub(crate) fn in_utc(at: DateTimeWithTimeZone) -> DateTimeWithTimeZone {
    at.with_timezone(&Utc).fixed_offset()
}

/// Unwraps a required input field, recording "This field is required." when absent.
pub(crate) fn required<T>(errors: &mut ValidationErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// CRUD surface shared by every record kind.
///
/// `Input` is the writable shape of a record: every field optional so that a
/// PATCH body can be merged onto the stored state before the full validation
/// runs again.
#[async_trait]
pub trait RecordService: Send + Sync + 'static {
    const KIND: EntityKind;

    type Record: Serialize + Send + Sync;
    type Input: Serialize + DeserializeOwned + Send + Sync + 'static;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller)
    -> ServiceResult<Vec<Self::Record>>;

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<Self::Record>;

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: Self::Input,
    ) -> ServiceResult<Self::Record>;

    /// Full replacement of every writable field.
    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: Self::Input,
    ) -> ServiceResult<Self::Record>;

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()>;

    /// Writable state of a stored record, the base a PATCH is merged onto.
    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<Self::Input>;

    /// Fields `caller` may send in a PATCH; `None` means no restriction.
    fn patchable_fields(&self, _caller: &Caller) -> Option<&'static [&'static str]> {
        None
    }

    /// Merges `changes` onto the stored record and runs a full update.
    async fn patch(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        mut changes: Map<String, Value>,
    ) -> ServiceResult<Self::Record> {
        if let Some(allowed) = self.patchable_fields(caller) {
            changes.retain(|field, _| allowed.contains(&field.as_str()));
            if changes.is_empty() {
                return Err(
                    ValidationErrors::single(NON_FIELD_ERRORS, "No valid fields to update.").into(),
                );
            }
        }

        let current = self.current_input(db, caller, id).await?;
        let mut merged = match serde_json::to_value(current) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        merged.extend(changes);

        let input: Self::Input = serde_json::from_value(Value::Object(merged))
            .map_err(|err| ValidationErrors::single(NON_FIELD_ERRORS, err.to_string()))?;
        self.update(db, caller, id, input).await
    }
}

/// Loads one record and checks it against the caller's tenant scope.
///
/// A row of another company is reported as PermissionDenied, never returned.
pub(crate) async fn find_scoped<E, C>(
    conn: &C,
    caller: &Caller,
    kind: EntityKind,
    id: Uuid,
) -> ServiceResult<E::Model>
where
    E: EntityTrait,
    E::Model: TenantOwned,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
    C: ConnectionTrait,
{
    let record = E::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(ServiceError::NotFound(kind.label()))?;

    if !caller.scope().permits(record.owner()) {
        tracing::info!(
            user_id = %caller.user_id,
            kind = kind.label(),
            record_id = %id,
            "Cross-tenant access refused"
        );
        return Err(ServiceError::PermissionDenied(format!(
            "You do not have permission to access this {}.",
            kind.label().to_lowercase()
        )));
    }

    Ok(record)
}

/// Lists the records visible to the caller, ordered by `order_column`.
pub(crate) async fn list_scoped<E>(
    db: &DatabaseConnection,
    caller: &Caller,
    company_column: E::Column,
    order_column: E::Column,
) -> ServiceResult<Vec<E::Model>>
where
    E: EntityTrait,
{
    let Some(select) = caller.scope().restrict(E::find(), company_column) else {
        return Ok(Vec::new());
    };
    Ok(select.order_by_asc(order_column).all(db).await?)
}

/// Deletes one in-scope record inside a transaction.
pub(crate) async fn delete_scoped<E>(
    db: &DatabaseConnection,
    caller: &Caller,
    kind: EntityKind,
    id: Uuid,
) -> ServiceResult<()>
where
    E: EntityTrait,
    E::Model: TenantOwned,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    let txn = db.begin().await?;
    find_scoped::<E, _>(&txn, caller, kind, id).await?;
    E::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        user_id = %caller.user_id,
        kind = kind.label(),
        record_id = %id,
        "Record deleted"
    );
    Ok(())
}

/// Resolves a referenced record that must belong to `company_id`.
///
/// A missing or foreign row records an "Invalid pk" error on `field`.
pub(crate) async fn reference_in_company<E, C>(
    conn: &C,
    errors: &mut ValidationErrors,
    field: &str,
    id: Uuid,
    company_id: Uuid,
) -> ServiceResult<Option<E::Model>>
where
    E: EntityTrait,
    E::Model: TenantOwned,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
    C: ConnectionTrait,
{
    match E::find_by_id(id).one(conn).await? {
        Some(record) if record.owner() == Some(company_id) => Ok(Some(record)),
        _ => {
            errors.add(field, invalid_pk(id));
            Ok(None)
        }
    }
}

/// True when a row other than `exclude` matches `condition`.
pub(crate) async fn is_taken<E, C>(
    conn: &C,
    condition: Condition,
    id_column: E::Column,
    exclude: Option<Uuid>,
) -> ServiceResult<bool>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let condition = match exclude {
        Some(id) => condition.add(id_column.ne(id)),
        None => condition,
    };
    Ok(E::find().filter(condition).one(conn).await?.is_some())
}

/// Owning company of a new record; a company named by a superuser must exist.
pub(crate) async fn company_for_create<C>(
    conn: &C,
    caller: &Caller,
    requested: Option<Uuid>,
) -> ServiceResult<Uuid>
where
    C: ConnectionTrait,
{
    let company_id = caller.company_for_create(requested)?;
    ensure_company_exists(conn, caller, company_id).await?;
    Ok(company_id)
}

/// Owning company after an update; only superusers may move a record.
pub(crate) async fn company_for_update<C>(
    conn: &C,
    caller: &Caller,
    current: Uuid,
    requested: Option<Uuid>,
) -> ServiceResult<Uuid>
where
    C: ConnectionTrait,
{
    let company_id = caller.company_for_update(current, requested)?;
    if company_id != current {
        ensure_company_exists(conn, caller, company_id).await?;
    }
    Ok(company_id)
}

pub(crate) const REFERENCED_MOVE: &str =
    "Cannot move this record to another company while other records reference it.";

/// Whether any `E` row points at `id` through `column`.
pub(crate) async fn is_referenced<E, C>(conn: &C, column: E::Column, id: Uuid) -> ServiceResult<bool>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    Ok(E::find().filter(column.eq(id)).one(conn).await?.is_some())
}

async fn ensure_company_exists<C>(conn: &C, caller: &Caller, company_id: Uuid) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    if caller.is_superuser && Company::find_by_id(company_id).one(conn).await?.is_none() {
        return Err(ValidationErrors::single("company_id", invalid_pk(company_id)).into());
    }
    Ok(())
}
