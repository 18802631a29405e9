//! Work shifts.

use async_trait::async_trait;
use chrono::NaiveTime;
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
use crate::models::{Schedule, Shift, schedule};
use crate::models::shift::{self, ShiftStatus};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftInput {
    pub company_id: Option<Uuid>,
    pub name: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_minutes: Option<i32>,
    pub status: Option<ShiftStatus>,
}

/// A shift as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftRecord {
    #[serde(flatten)]
    pub shift: shift::Model,
    pub duration_minutes: i64,
}

impl From<shift::Model> for ShiftRecord {
    fn from(shift: shift::Model) -> Self {
        let duration_minutes = shift.duration_minutes();
        Self {
            shift,
            duration_minutes,
        }
    }
}

struct ShiftFields {
    name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    break_minutes: Option<i32>,
    status: ShiftStatus,
}

impl ShiftInput {
    fn check(self) -> Result<ShiftFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = required(&mut errors, "name", self.name.map(|n| n.trim().to_string()));
        if let Some(name) = &name {
            errors.check_len("name", name, 1, 50);
        }
        let start_time = required(&mut errors, "start_time", self.start_time);
        let end_time = required(&mut errors, "end_time", self.end_time);

        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end <= start {
                errors.add_non_field("End time must be after start time.");
            } else if let Some(break_minutes) = self.break_minutes {
                errors.check_min("break_minutes", break_minutes, 0);
                if i64::from(break_minutes) >= (end - start).num_minutes() {
                    errors.add("break_minutes", "Break must be shorter than the shift.");
                }
            }
        }

        let (Some(name), Some(start_time), Some(end_time)) = (name, start_time, end_time) else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(ShiftFields {
            name,
            start_time,
            end_time,
            break_minutes: self.break_minutes,
            status: self.status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftService;

impl ShiftService {
    async fn has_dependents<C: ConnectionTrait>(conn: &C, id: Uuid) -> ServiceResult<bool> {
        is_referenced::<Schedule, _>(conn, schedule::Column::ShiftId, id).await
    }

    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: ShiftInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<ShiftFields> {
        let fields = input.check()?;
        if is_taken::<Shift, _>(
            conn,
            Condition::all()
                .add(shift::Column::CompanyId.eq(company_id))
                .add(shift::Column::Name.eq(fields.name.as_str())),
            shift::Column::Id,
            exclude,
        )
        .await?
        {
            return Err(ValidationErrors::single(
                "name",
                "A shift with this name already exists in the company.",
            )
            .into());
        }
        Ok(fields)
    }

    fn apply(active: &mut shift::ActiveModel, fields: ShiftFields) {
        active.name = Set(fields.name);
        active.start_time = Set(fields.start_time);
        active.end_time = Set(fields.end_time);
        active.break_minutes = Set(fields.break_minutes);
        active.status = Set(fields.status);
    }
}

#[async_trait]
impl RecordService for ShiftService {
    const KIND: EntityKind = EntityKind::Shift;

    type Record = ShiftRecord;
    type Input = ShiftInput;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller) -> ServiceResult<Vec<ShiftRecord>> {
        let shifts =
            list_scoped::<Shift>(db, caller, shift::Column::CompanyId, shift::Column::StartTime)
                .await?;
        Ok(shifts.into_iter().map(ShiftRecord::from).collect())
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<ShiftRecord> {
        Ok(find_scoped::<Shift, _>(db, caller, Self::KIND, id).await?.into())
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: ShiftInput,
    ) -> ServiceResult<ShiftRecord> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let mut active = shift::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Self::apply(&mut active, fields);
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(shift_id = %model.id, company_id = %company_id, "Shift created");
        Ok(model.into())
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: ShiftInput,
    ) -> ServiceResult<ShiftRecord> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Shift, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        if company_id != existing.company_id && Self::has_dependents(&txn, id).await? {
            return Err(ValidationErrors::single("company_id", REFERENCED_MOVE).into());
        }
        let fields = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: shift::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        Self::apply(&mut active, fields);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model.into())
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Shift>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<ShiftInput> {
        let model = find_scoped::<Shift, _>(db, caller, Self::KIND, id).await?;
        Ok(ShiftInput {
            company_id: Some(model.company_id),
            name: Some(model.name),
            start_time: Some(model.start_time),
            end_time: Some(model.end_time),
            break_minutes: model.break_minutes,
            status: Some(model.status),
        })
    }
}
