//! Employee records.
//!
//! Besides the field rules, creating an employee is capped by the company's
//! effective employee limit, and a PATCH by an HR or STAFF member may only
//! touch the fields their role allows.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::effective_employee_limit;
use super::{
    REFERENCED_MOVE, RecordService, ServiceResult, company_for_create, company_for_update,
    delete_scoped, find_scoped, is_referenced, is_taken, list_scoped, now, reference_in_company,
    required,
};
use crate::access::{Caller, EntityKind};
use crate::models::employee::{self, BloodGroup, Gender, MaritalStatus, Religion, compose_full_name};
use crate::models::user::Role;
use crate::models::{
    AttendanceLog, Department, Employee, LeaveBalance, LeaveRequest, Schedule, WorkHours,
    attendance_log, leave_balance, leave_request, schedule, work_hours,
};
use crate::validation::{
    NON_FIELD_ERRORS, ValidationErrors, check_phone_digits, is_alphanumeric, normalize_opt,
};

/// Fields a STAFF member may change through PATCH.
pub const STAFF_PATCHABLE_FIELDS: &[&str] = &["contact_number", "date_of_joining"];
/// Fields an HR member may change through PATCH.
pub const HR_PATCHABLE_FIELDS: &[&str] = &["employee_id"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeInput {
    pub company_id: Option<Uuid>,
    pub employee_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub position: Option<String>,
    pub contact_number: Option<String>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub religion: Option<Religion>,
    pub marital_status: Option<MaritalStatus>,
    pub date_of_joining: Option<NaiveDate>,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
}

/// Input after normalization; what gets stored.
struct EmployeeFields {
    employee_id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    department_id: Option<Uuid>,
    position: Option<String>,
    contact_number: Option<String>,
    gender: Gender,
    blood_group: Option<BloodGroup>,
    religion: Option<Religion>,
    marital_status: Option<MaritalStatus>,
    date_of_joining: Option<NaiveDate>,
    date_of_birth: Option<NaiveDate>,
    email: Option<String>,
    address: Option<String>,
    bank_name: Option<String>,
    bank_account_number: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_number: Option<String>,
}

impl EmployeeFields {
    fn full_name(&self) -> String {
        compose_full_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

fn earliest_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Field rules that need no store access.
fn check_fields(input: EmployeeInput, today: NaiveDate) -> Result<EmployeeFields, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let employee_id = required(
        &mut errors,
        "employee_id",
        input.employee_id.map(|id| id.trim().to_string()),
    );
    if let Some(id) = &employee_id {
        errors.check_len("employee_id", id, 1, 20);
        if !id.is_empty() && !is_alphanumeric(id) {
            errors.add("employee_id", "Employee ID must be alphanumeric.");
        }
    }

    let first_name = normalize_opt(input.first_name);
    let last_name = normalize_opt(input.last_name);
    errors.check_opt_len("first_name", first_name.as_deref(), 50);
    errors.check_opt_len("last_name", last_name.as_deref(), 50);
    if first_name.is_none() && last_name.is_none() {
        errors.add(
            NON_FIELD_ERRORS,
            "At least one of First Name or Last Name must be provided.",
        );
    }

    let position = normalize_opt(input.position);
    errors.check_opt_len("position", position.as_deref(), 50);

    let contact_number = normalize_opt(input.contact_number);
    if let Some(number) = &contact_number {
        check_phone_digits(&mut errors, "contact_number", "Contact number", number);
    }

    if let Some(joined) = input.date_of_joining
        && joined > today
    {
        errors.add("date_of_joining", "Date of joining cannot be in the future.");
    }
    if let Some(born) = input.date_of_birth {
        if born <= earliest_birth_date() {
            errors.add("date_of_birth", "Date of birth must be after 1900-01-01.");
        } else if let Some(joined) = input.date_of_joining
            && born >= joined
        {
            errors.add(
                "date_of_birth",
                "Date of birth must be before the date of joining.",
            );
        }
    }

    let email = normalize_opt(input.email).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        errors.check_email("email", email);
    }

    let address = normalize_opt(input.address);
    errors.check_opt_len("address", address.as_deref(), 255);

    let bank_name = normalize_opt(input.bank_name);
    errors.check_opt_len("bank_name", bank_name.as_deref(), 100);
    let bank_account_number = normalize_opt(input.bank_account_number);
    if let Some(account) = &bank_account_number {
        if !is_alphanumeric(account) {
            errors.add("bank_account_number", "Bank account number must be alphanumeric.");
        }
        errors.check_opt_len("bank_account_number", Some(account), 34);
    }

    let emergency_contact_name = normalize_opt(input.emergency_contact_name);
    errors.check_opt_len(
        "emergency_contact_name",
        emergency_contact_name.as_deref(),
        100,
    );
    let emergency_contact_number = normalize_opt(input.emergency_contact_number);
    if let Some(number) = &emergency_contact_number {
        check_phone_digits(
            &mut errors,
            "emergency_contact_number",
            "Emergency contact number",
            number,
        );
    }

    let Some(employee_id) = employee_id else {
        return Err(errors);
    };
    errors.finish()?;

    Ok(EmployeeFields {
        employee_id,
        first_name,
        last_name,
        department_id: input.department_id,
        position,
        contact_number,
        gender: input.gender.unwrap_or_default(),
        blood_group: input.blood_group,
        religion: input.religion,
        marital_status: input.marital_status,
        date_of_joining: input.date_of_joining,
        date_of_birth: input.date_of_birth,
        email,
        address,
        bank_name,
        bank_account_number,
        emergency_contact_name,
        emergency_contact_number,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmployeeService;

impl EmployeeService {
    /// Whether a punch, schedule, work-hours row or leave record names this employee.
    async fn has_dependents<C: ConnectionTrait>(conn: &C, id: Uuid) -> ServiceResult<bool> {
        Ok(
            is_referenced::<AttendanceLog, _>(conn, attendance_log::Column::EmployeeId, id).await?
                || is_referenced::<Schedule, _>(conn, schedule::Column::EmployeeId, id).await?
                || is_referenced::<WorkHours, _>(conn, work_hours::Column::EmployeeId, id).await?
                || is_referenced::<LeaveBalance, _>(conn, leave_balance::Column::EmployeeId, id)
                    .await?
                || is_referenced::<LeaveRequest, _>(conn, leave_request::Column::EmployeeId, id)
                    .await?,
        )
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: EmployeeInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<EmployeeFields> {
        let fields = check_fields(input, Utc::now().date_naive())?;
        let mut errors = ValidationErrors::new();

        if let Some(department_id) = fields.department_id {
            reference_in_company::<Department, _>(
                conn,
                &mut errors,
                "department_id",
                department_id,
                company_id,
            )
            .await?;
        }

        if is_taken::<Employee, _>(
            conn,
            Condition::all()
                .add(employee::Column::CompanyId.eq(company_id))
                .add(employee::Column::EmployeeId.eq(fields.employee_id.as_str())),
            employee::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(
                "employee_id",
                "An employee with this ID already exists in the company.",
            );
        }

        if let Some(number) = &fields.contact_number
            && is_taken::<Employee, _>(
                conn,
                Condition::all().add(employee::Column::ContactNumber.eq(number.as_str())),
                employee::Column::Id,
                exclude,
            )
            .await?
        {
            errors.add(
                "contact_number",
                "Employee with this contact number already exists.",
            );
        }

        if let Some(email) = &fields.email
            && is_taken::<Employee, _>(
                conn,
                Condition::all().add(employee::Column::Email.eq(email.as_str())),
                employee::Column::Id,
                exclude,
            )
            .await?
        {
            errors.add("email", "Employee with this email already exists.");
        }

        errors.finish()?;
        Ok(fields)
    }

    async fn check_employee_limit<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
    ) -> ServiceResult<()> {
        let Some(limit) = effective_employee_limit(conn, company_id).await? else {
            return Ok(());
        };
        let current = Employee::find()
            .filter(employee::Column::CompanyId.eq(company_id))
            .count(conn)
            .await?;

        if current >= u64::try_from(limit).unwrap_or(0) {
            tracing::info!(company_id = %company_id, limit, "Employee limit reached");
            return Err(ValidationErrors::single(
                NON_FIELD_ERRORS,
                format!(
                    "Cannot add more employees. The maximum limit of {limit} employees for this company's subscription has been reached."
                ),
            )
            .into());
        }
        Ok(())
    }

    fn apply(active: &mut employee::ActiveModel, fields: EmployeeFields) {
        active.full_name = Set(fields.full_name());
        active.employee_id = Set(fields.employee_id);
        active.first_name = Set(fields.first_name);
        active.last_name = Set(fields.last_name);
        active.department_id = Set(fields.department_id);
        active.position = Set(fields.position);
        active.contact_number = Set(fields.contact_number);
        active.gender = Set(fields.gender);
        active.blood_group = Set(fields.blood_group);
        active.religion = Set(fields.religion);
        active.marital_status = Set(fields.marital_status);
        active.date_of_joining = Set(fields.date_of_joining);
        active.date_of_birth = Set(fields.date_of_birth);
        active.email = Set(fields.email);
        active.address = Set(fields.address);
        active.bank_name = Set(fields.bank_name);
        active.bank_account_number = Set(fields.bank_account_number);
        active.emergency_contact_name = Set(fields.emergency_contact_name);
        active.emergency_contact_number = Set(fields.emergency_contact_number);
    }
}

#[async_trait]
impl RecordService for EmployeeService {
    const KIND: EntityKind = EntityKind::Employee;

    type Record = employee::Model;
    type Input = EmployeeInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<employee::Model>> {
        list_scoped::<Employee>(
            db,
            caller,
            employee::Column::CompanyId,
            employee::Column::EmployeeId,
        )
        .await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<employee::Model> {
        find_scoped::<Employee, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: EmployeeInput,
    ) -> ServiceResult<employee::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;
        Self::check_employee_limit(&txn, company_id).await?;

        let now = now();
        let mut active = employee::ActiveModel {
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
            employee_id = %model.id,
            company_id = %company_id,
            badge = %model.employee_id,
            "Employee created"
        );
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: EmployeeInput,
    ) -> ServiceResult<employee::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Employee, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        if company_id != existing.company_id && Self::has_dependents(&txn, id).await? {
            return Err(ValidationErrors::single("company_id", REFERENCED_MOVE).into());
        }
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;
        if company_id != existing.company_id {
            Self::check_employee_limit(&txn, company_id).await?;
        }

        let mut active: employee::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Employee>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<EmployeeInput> {
        let model = find_scoped::<Employee, _>(db, caller, Self::KIND, id).await?;
        Ok(EmployeeInput {
            company_id: Some(model.company_id),
            employee_id: Some(model.employee_id),
            first_name: model.first_name,
            last_name: model.last_name,
            department_id: model.department_id,
            position: model.position,
            contact_number: model.contact_number,
            gender: Some(model.gender),
            blood_group: model.blood_group,
            religion: model.religion,
            marital_status: model.marital_status,
            date_of_joining: model.date_of_joining,
            date_of_birth: model.date_of_birth,
            email: model.email,
            address: model.address,
            bank_name: model.bank_name,
            bank_account_number: model.bank_account_number,
            emergency_contact_name: model.emergency_contact_name,
            emergency_contact_number: model.emergency_contact_number,
        })
    }

    fn patchable_fields(&self, caller: &Caller) -> Option<&'static [&'static str]> {
        if caller.is_superuser {
            return None;
        }
        match caller.role {
            Some(Role::Staff) => Some(STAFF_PATCHABLE_FIELDS),
            Some(Role::Hr) => Some(HR_PATCHABLE_FIELDS),
            None => None,
        }
    }
}
