//! Companies (the tenants).
//!
//! Superusers create and delete companies. Members may read and edit their
//! own company but not its plan, employee limit or activation switch.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceError, ServiceResult, delete_scoped, find_scoped, invalid_pk, is_taken,
    list_scoped, now, required,
};
use crate::access::{Caller, EntityKind};
use crate::models::company;
use crate::models::{Company, Subscription};
use crate::validation::{ValidationErrors, normalize_opt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
    pub subscription_id: Option<Uuid>,
    pub employee_limit: Option<i32>,
}

struct CompanyFields {
    name: String,
    address: Option<String>,
    is_active: bool,
    subscription_id: Option<Uuid>,
    employee_limit: Option<i32>,
}

/// Rules for a company name, reported under `field`.
pub fn check_company_name(errors: &mut ValidationErrors, field: &str, name: &str) {
    if name.chars().count() < 3 {
        errors.add(field, "Company name must be at least 3 characters long.");
    } else if name.chars().any(|c| c.is_ascii_digit()) {
        errors.add(field, "Company name must not contain numbers.");
    } else {
        errors.check_len(field, name, 3, 255);
    }
}

impl CompanyInput {
    fn check(self) -> Result<CompanyFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = required(&mut errors, "name", self.name.map(|n| n.trim().to_string()));
        if let Some(name) = &name {
            check_company_name(&mut errors, "name", name);
        }

        let address = normalize_opt(self.address);
        errors.check_opt_len("address", address.as_deref(), 255);

        let is_active = self.is_active.unwrap_or(true);
        if is_active && address.is_none() {
            errors.add("address", "Active companies must have an address.");
        }

        if let Some(limit) = self.employee_limit {
            errors.check_min("employee_limit", limit, 1);
        }

        let Some(name) = name else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(CompanyFields {
            name,
            address,
            is_active,
            subscription_id: self.subscription_id,
            employee_limit: self.employee_limit,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompanyService;

impl CompanyService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        input: CompanyInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<CompanyFields> {
        let fields = input.check()?;
        let mut errors = ValidationErrors::new();

        if is_taken::<Company, _>(
            conn,
            Condition::all().add(company::Column::Name.eq(fields.name.as_str())),
            company::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("name", "Company with this name already exists.");
        }

        if let Some(subscription_id) = fields.subscription_id
            && Subscription::find_by_id(subscription_id)
                .one(conn)
                .await?
                .is_none()
        {
            errors.add("subscription_id", invalid_pk(subscription_id));
        }

        errors.finish()?;
        Ok(fields)
    }
}

#[async_trait]
impl RecordService for CompanyService {
    const KIND: EntityKind = EntityKind::Company;

    type Record = company::Model;
    type Input = CompanyInput;

    async fn list(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
    ) -> ServiceResult<Vec<company::Model>> {
        list_scoped::<Company>(db, caller, company::Column::Id, company::Column::Name).await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<company::Model> {
        find_scoped::<Company, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: CompanyInput,
    ) -> ServiceResult<company::Model> {
        if !caller.is_superuser {
            return Err(ServiceError::PermissionDenied(
                "Only superusers can create companies.".to_string(),
            ));
        }

        let txn = db.begin().await?;
        let fields = Self::validate(&txn, input, None).await?;
        let now = now();
        let model = company::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(fields.name),
            address: Set(fields.address),
            is_active: Set(fields.is_active),
            subscription_id: Set(fields.subscription_id),
            employee_limit: Set(fields.employee_limit),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(company_id = %model.id, name = %model.name, "Company created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: CompanyInput,
    ) -> ServiceResult<company::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<Company, _>(&txn, caller, Self::KIND, id).await?;
        let fields = Self::validate(&txn, input, Some(id)).await?;

        if !caller.is_superuser
            && (fields.is_active != existing.is_active
                || fields.subscription_id != existing.subscription_id
                || fields.employee_limit != existing.employee_limit)
        {
            return Err(ServiceError::PermissionDenied(
                "Only superusers can change a company's plan, limit or status.".to_string(),
            ));
        }

        let mut active: company::ActiveModel = existing.into();
        active.name = Set(fields.name);
        active.address = Set(fields.address);
        active.is_active = Set(fields.is_active);
        active.subscription_id = Set(fields.subscription_id);
        active.employee_limit = Set(fields.employee_limit);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!(company_id = %model.id, is_active = model.is_active, "Company updated");
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        if !caller.is_superuser {
            return Err(ServiceError::PermissionDenied(
                "Only superusers can delete companies.".to_string(),
            ));
        }
        delete_scoped::<Company>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<CompanyInput> {
        let model = find_scoped::<Company, _>(db, caller, Self::KIND, id).await?;
        Ok(CompanyInput {
            name: Some(model.name),
            address: model.address,
            is_active: Some(model.is_active),
            subscription_id: model.subscription_id,
            employee_limit: model.employee_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{insert_company, root, setup_db};

    fn acme() -> CompanyInput {
        CompanyInput {
            name: Some("Acme Textiles".to_string()),
            address: Some("Plot 7, Gazipur".to_string()),
            ..CompanyInput::default()
        }
    }

    #[test]
    fn test_name_rules() {
        let mut errors = ValidationErrors::new();
        check_company_name(&mut errors, "name", "AB");
        check_company_name(&mut errors, "name", "Acme 2000");
        check_company_name(&mut errors, "name", "Acme");
        assert_eq!(errors.errors().len(), 2);
        assert_eq!(
            errors.errors()[0].error,
            "Company name must be at least 3 characters long."
        );
        assert_eq!(errors.errors()[1].error, "Company name must not contain numbers.");
    }

    #[test]
    fn test_active_company_needs_address() {
        let input = CompanyInput {
            address: None,
            ..acme()
        };
        let errors = input.check().err().unwrap();
        assert!(errors.has("address"));

        let inactive = CompanyInput {
            address: None,
            is_active: Some(false),
            ..acme()
        };
        assert!(inactive.check().is_ok());
    }

    #[tokio::test]
    async fn test_member_sees_only_own_company() {
        let db = setup_db().await;
        let own = insert_company(&db, "Own Company").await;
        let other = insert_company(&db, "Other Company").await;
        let member = Caller::test_member(own);

        let listed = CompanyService.list(&db, &member).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, own);

        assert!(matches!(
            CompanyService.get(&db, &member, other).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_member_cannot_deactivate_company() {
        let db = setup_db().await;
        let own = insert_company(&db, "Own Company").await;
        let member = Caller::test_member(own);

        let mut input = CompanyService.current_input(&db, &member, own).await.unwrap();
        input.is_active = Some(false);
        assert!(matches!(
            CompanyService.update(&db, &member, own, input).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_superuser_creates_and_duplicate_name_fails() {
        let db = setup_db().await;
        let created = CompanyService.create(&db, &root(), acme()).await.unwrap();
        assert!(created.is_active);

        match CompanyService.create(&db, &root(), acme()).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
