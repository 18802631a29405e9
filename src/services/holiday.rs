//! Company holidays.

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
    find_scoped, is_taken, list_scoped, now, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::{Holiday, holiday};
use crate::validation::{NON_FIELD_ERRORS, ValidationErrors};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayInput {
    pub company_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HolidayService;

impl HolidayService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        company_id: Uuid,
        input: HolidayInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<(NaiveDate, String)> {
        let mut errors = ValidationErrors::new();

        let date = required(&mut errors, "date", input.date);
        let reason = required(&mut errors, "reason", input.reason.map(|r| r.trim().to_string()));
        if let Some(reason) = &reason {
            errors.check_len("reason", reason, 1, 255);
        }

        let (Some(date), Some(reason)) = (date, reason) else {
            return Err(errors.into());
        };
        if is_taken::<Holiday, _>(
            conn,
            Condition::all()
                .add(holiday::Column::CompanyId.eq(company_id))
                .add(holiday::Column::Date.eq(date)),
            holiday::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add(NON_FIELD_ERRORS, "The fields company, date must make a unique set.");
        }

        errors.finish()?;
        Ok((date, reason))
    }
}

#[async_trait]
impl RecordService for HolidayService {
    const KIND: EntityKind = EntityKind::Holiday;

    type Record = holiday::Model;
    type Input = HolidayInput;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller) -> ServiceResult<Vec<holiday::Model>> {
        list_scoped::<Holiday>(db, caller, holiday::Column::CompanyId, holiday::Column::Date).await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<holiday::Model> {
        find_scoped::<Holiday, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: HolidayInput,
    ) -> ServiceResult<holiday::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let (date, reason) = Self::validate(&txn, company_id, input, None).await?;

        let now = now();
        let model = holiday::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            date: Set(date),
            reason: Set(reason),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(holiday_id = %model.id, date = %model.date, "Holiday created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: HolidayInput,
    ) -> ServiceResult<holiday::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Holiday, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let (date, reason) = Self::validate(&txn, company_id, input, Some(id)).await?;

        let mut active: holiday::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        active.date = Set(date);
        active.reason = Set(reason);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Holiday>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<HolidayInput> {
        let model = find_scoped::<Holiday, _>(db, caller, Self::KIND, id).await?;
        Ok(HolidayInput {
            company_id: Some(model.company_id),
            date: Some(model.date),
            reason: Some(model.reason),
        })
    }
}
