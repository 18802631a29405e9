//! Company notices.

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceResult, company_for_create, company_for_update, delete_scoped,
    find_scoped, list_scoped, now, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::{Notice, notice};
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeInput {
    pub company_id: Option<Uuid>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub published_at: Option<DateTimeWithTimeZone>,
    pub is_active: Option<bool>,
}

struct NoticeFields {
    title: String,
    body: String,
    published_at: Option<DateTimeWithTimeZone>,
    is_active: bool,
}

impl NoticeInput {
    fn check(self) -> Result<NoticeFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required(&mut errors, "title", self.title.map(|t| t.trim().to_string()));
        if let Some(title) = &title {
            errors.check_len("title", title, 1, 200);
        }
        let body = required(&mut errors, "body", self.body);
        if body.as_deref().is_some_and(|b| b.trim().is_empty()) {
            errors.add("body", "This field may not be blank.");
        }

        let (Some(title), Some(body)) = (title, body) else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(NoticeFields {
            title,
            body,
            published_at: self.published_at,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoticeService;

#[async_trait]
impl RecordService for NoticeService {
    const KIND: EntityKind = EntityKind::Notice;

    type Record = notice::Model;
    type Input = NoticeInput;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller) -> ServiceResult<Vec<notice::Model>> {
        list_scoped::<Notice>(db, caller, notice::Column::CompanyId, notice::Column::CreatedAt).await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<notice::Model> {
        find_scoped::<Notice, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: NoticeInput,
    ) -> ServiceResult<notice::Model> {
        let txn = db.begin().await?;
        let company_id = company_for_create(&txn, caller, input.company_id).await?;
        let fields = input.check()?;

        let now = now();
        let model = notice::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            title: Set(fields.title),
            body: Set(fields.body),
            published_at: Set(fields.published_at),
            is_active: Set(fields.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(notice_id = %model.id, company_id = %company_id, "Notice created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: NoticeInput,
    ) -> ServiceResult<notice::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Notice, _>(&txn, caller, Self::KIND, id).await?;
        let company_id =
            company_for_update(&txn, caller, existing.company_id, input.company_id).await?;
        let fields = input.check()?;

        let mut active: notice::ActiveModel = existing.into();
        active.company_id = Set(company_id);
        active.title = Set(fields.title);
        active.body = Set(fields.body);
        active.published_at = Set(fields.published_at);
        active.is_active = Set(fields.is_active);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        delete_scoped::<Notice>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<NoticeInput> {
        let model = find_scoped::<Notice, _>(db, caller, Self::KIND, id).await?;
        Ok(NoticeInput {
            company_id: Some(model.company_id),
            title: Some(model.title),
            body: Some(model.body),
            published_at: model.published_at,
            is_active: Some(model.is_active),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_body_required() {
        let errors = NoticeInput::default().check().err().unwrap();
        assert!(errors.has("title"));
        assert!(errors.has("body"));

        let errors = NoticeInput {
            title: Some("x".repeat(201)),
            body: Some("  ".to_string()),
            ..NoticeInput::default()
        }
        .check()
        .err()
        .unwrap();
        assert!(errors.has("title"));
        assert!(errors.has("body"));
    }

    #[test]
    fn test_active_by_default() {
        let fields = NoticeInput {
            title: Some("Eid holidays".to_string()),
            body: Some("Office stays closed from 10 to 13 April.".to_string()),
            ..NoticeInput::default()
        }
        .check()
        .ok()
        .unwrap();
        assert!(fields.is_active);
        assert!(fields.published_at.is_none());
    }
}
