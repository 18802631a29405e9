//! User accounts and their capability grants.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    RecordService, ServiceError, ServiceResult, company_for_update, delete_scoped, find_scoped,
    invalid_pk, is_taken, list_scoped, now, required,
};
use crate::access::{Capability, Caller, EntityKind};
use crate::auth::password::{check_password, hash_password};
use crate::models::user::{self, Role};
use crate::models::{Company, User, UserPermission, user_permission};
use crate::validation::{ValidationErrors, is_valid_mobile, normalize_opt};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub mobile_no: Option<String>,
    /// Write-only; omitted keeps the current password
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub company_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_company_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub role: Option<Role>,
}

struct UserFields {
    email: String,
    username: String,
    mobile_no: Option<String>,
    password: Option<String>,
    is_active: bool,
    is_company_active: bool,
    is_superuser: bool,
    role: Option<Role>,
}

impl UserInput {
    fn check(self, password_required: bool) -> Result<UserFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = required(&mut errors, "email", self.email.map(|e| e.trim().to_lowercase()));
        if let Some(email) = &email {
            errors.check_email("email", email);
        }

        let username = required(
            &mut errors,
            "username",
            self.username.map(|u| u.trim().to_string()),
        );
        if let Some(username) = &username {
            errors.check_len("username", username, 1, 150);
        }

        let mobile_no = normalize_opt(self.mobile_no);
        if let Some(mobile) = &mobile_no
            && !is_valid_mobile(mobile)
        {
            errors.add("mobile_no", "Enter a valid mobile number.");
        }

        let password = if password_required {
            required(&mut errors, "password", self.password)
        } else {
            self.password
        };
        if let Some(password) = &password {
            check_password(&mut errors, "password", password);
        }

        let (Some(email), Some(username)) = (email, username) else {
            return Err(errors);
        };
        errors.finish()?;
        Ok(UserFields {
            email,
            username,
            mobile_no,
            password,
            is_active: self.is_active.unwrap_or(true),
            is_company_active: self.is_company_active.unwrap_or(true),
            is_superuser: self.is_superuser.unwrap_or(false),
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UserService;

impl UserService {
    async fn validate<C: ConnectionTrait>(
        conn: &C,
        caller: &Caller,
        input: UserInput,
        exclude: Option<Uuid>,
    ) -> ServiceResult<UserFields> {
        let fields = input.check(exclude.is_none())?;

        if fields.is_superuser && !caller.is_superuser {
            return Err(ServiceError::PermissionDenied(
                "Only superusers can grant superuser status.".to_string(),
            ));
        }

        let mut errors = ValidationErrors::new();
        if is_taken::<User, _>(
            conn,
            Condition::all().add(user::Column::Email.eq(fields.email.as_str())),
            user::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("email", "User with this email already exists.");
        }
        if is_taken::<User, _>(
            conn,
            Condition::all().add(user::Column::Username.eq(fields.username.as_str())),
            user::Column::Id,
            exclude,
        )
        .await?
        {
            errors.add("username", "A user with that username already exists.");
        }
        errors.finish()?;
        Ok(fields)
    }

    /// Company of a user being created. Users may exist without a company, so
    /// a superuser is not forced to name one.
    async fn company_for_new_user<C: ConnectionTrait>(
        conn: &C,
        caller: &Caller,
        requested: Option<Uuid>,
    ) -> ServiceResult<Option<Uuid>> {
        if !caller.is_superuser {
            return caller.company_for_create(requested).map(Some);
        }
        match requested {
            Some(company_id) if Company::find_by_id(company_id).one(conn).await?.is_none() => {
                Err(ValidationErrors::single("company_id", invalid_pk(company_id)).into())
            }
            other => Ok(other),
        }
    }

    /// Global and per-object grants of one user.
    pub async fn permissions(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<Vec<PermissionGrant>> {
        Self::ensure_superuser(caller)?;
        find_scoped::<User, _>(db, caller, Self::KIND, id).await?;

        let grants = UserPermission::find()
            .filter(user_permission::Column::UserId.eq(id))
            .order_by_asc(user_permission::Column::Codename)
            .all(db)
            .await?;
        Ok(grants
            .into_iter()
            .map(|grant| PermissionGrant {
                codename: grant.codename,
                object_id: grant.object_id,
            })
            .collect())
    }

    /// Replaces every grant of a user.
    pub async fn set_permissions(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        grants: Vec<PermissionGrant>,
    ) -> ServiceResult<Vec<PermissionGrant>> {
        Self::ensure_superuser(caller)?;

        let mut errors = ValidationErrors::new();
        for (index, grant) in grants.iter().enumerate() {
            if grant.codename.parse::<Capability>().is_err() {
                errors.add(
                    format!("permissions[{index}]"),
                    format!("Unknown permission \"{}\".", grant.codename),
                );
            }
        }
        errors.finish()?;

        let txn = db.begin().await?;
        find_scoped::<User, _>(&txn, caller, Self::KIND, id).await?;
        UserPermission::delete_many()
            .filter(user_permission::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        let now = now();
        for grant in &grants {
            user_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(id),
                codename: Set(grant.codename.clone()),
                object_id: Set(grant.object_id),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        tracing::info!(user_id = %id, grants = grants.len(), "User permissions replaced");
        self.permissions(db, caller, id).await
    }

    fn ensure_superuser(caller: &Caller) -> ServiceResult<()> {
        if caller.is_superuser {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "Only superusers can manage user permissions.".to_string(),
            ))
        }
    }
}

/// One stored grant as exchanged over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub codename: String,
    #[serde(default)]
    pub object_id: Option<Uuid>,
}

impl PermissionGrant {
    pub fn global(capability: Capability) -> Self {
        Self {
            codename: capability.codename(),
            object_id: None,
        }
    }
}

#[async_trait]
impl RecordService for UserService {
    const KIND: EntityKind = EntityKind::User;

    type Record = user::Model;
    type Input = UserInput;

    async fn list(&self, db: &DatabaseConnection, caller: &Caller) -> ServiceResult<Vec<user::Model>> {
        list_scoped::<User>(db, caller, user::Column::CompanyId, user::Column::Email).await
    }

    async fn get(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<user::Model> {
        find_scoped::<User, _>(db, caller, Self::KIND, id).await
    }

    async fn create(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        input: UserInput,
    ) -> ServiceResult<user::Model> {
        let txn = db.begin().await?;
        let company_id = Self::company_for_new_user(&txn, caller, input.company_id).await?;
        let fields = Self::validate(&txn, caller, input, None).await?;

        let password = fields.password.unwrap_or_default();
        let now = now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(fields.email),
            username: Set(fields.username),
            mobile_no: Set(fields.mobile_no),
            password_hash: Set(hash_password(&password)?),
            company_id: Set(company_id),
            is_active: Set(fields.is_active),
            is_company_active: Set(fields.is_company_active),
            is_superuser: Set(fields.is_superuser),
            role: Set(fields.role),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(user_id = %model.id, company_id = ?model.company_id, "User created");
        Ok(model)
    }

    async fn update(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
        input: UserInput,
    ) -> ServiceResult<user::Model> {
        let txn = db.begin().await?;
        let existing = find_scoped::<User, _>(&txn, caller, Self::KIND, id).await?;

        let company_id = match existing.company_id {
            Some(current) => Some(company_for_update(&txn, caller, current, input.company_id).await?),
            None => Self::company_for_new_user(&txn, caller, input.company_id).await?,
        };
        let fields = Self::validate(&txn, caller, input, Some(id)).await?;

        if existing.is_superuser && !caller.is_superuser {
            return Err(ServiceError::PermissionDenied(
                "Only superusers can modify superuser accounts.".to_string(),
            ));
        }

        let mut active: user::ActiveModel = existing.into();
        active.email = Set(fields.email);
        active.username = Set(fields.username);
        active.mobile_no = Set(fields.mobile_no);
        if let Some(password) = fields.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        active.company_id = Set(company_id);
        active.is_active = Set(fields.is_active);
        active.is_company_active = Set(fields.is_company_active);
        active.is_superuser = Set(fields.is_superuser);
        active.role = Set(fields.role);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn delete(&self, db: &DatabaseConnection, caller: &Caller, id: Uuid) -> ServiceResult<()> {
        if id == caller.user_id {
            return Err(ServiceError::PermissionDenied(
                "You cannot delete your own account.".to_string(),
            ));
        }
        delete_scoped::<User>(db, caller, Self::KIND, id).await
    }

    async fn current_input(
        &self,
        db: &DatabaseConnection,
        caller: &Caller,
        id: Uuid,
    ) -> ServiceResult<UserInput> {
        let model = find_scoped::<User, _>(db, caller, Self::KIND, id).await?;
        Ok(UserInput {
            email: Some(model.email),
            username: Some(model.username),
            mobile_no: model.mobile_no,
            password: None,
            company_id: model.company_id,
            is_active: Some(model.is_active),
            is_company_active: Some(model.is_company_active),
            is_superuser: Some(model.is_superuser),
            role: model.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Action, CapabilitySet};
    use crate::services::test_support::{insert_company, root, setup_db};

    fn staff_input() -> UserInput {
        UserInput {
            email: Some("Staff@Example.com".to_string()),
            username: Some("staff".to_string()),
            password: Some("s3cure-enough".to_string()),
            role: Some(Role::Staff),
            ..UserInput::default()
        }
    }

    #[tokio::test]
    async fn test_member_creates_user_in_own_company() {
        let db = setup_db().await;
        let company = insert_company(&db, "Own Company").await;
        let hr = Caller::test_member(company);

        let created = UserService.create(&db, &hr, staff_input()).await.unwrap();
        assert_eq!(created.company_id, Some(company));
        assert_eq!(created.email, "staff@example.com");
        assert!(created.password_hash.starts_with("$argon2"));

        let body = serde_json::to_value(&created).unwrap();
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_member_cannot_grant_superuser() {
        let db = setup_db().await;
        let company = insert_company(&db, "Own Company").await;
        let hr = Caller::test_member(company);

        let input = UserInput {
            is_superuser: Some(true),
            ..staff_input()
        };
        assert!(matches!(
            UserService.create(&db, &hr, input).await,
            Err(ServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_password_required_on_create_only() {
        let db = setup_db().await;
        let input = UserInput {
            password: None,
            ..staff_input()
        };
        match UserService.create(&db, &root(), input).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("password")),
            other => panic!("unexpected result: {other:?}"),
        }

        let created = UserService.create(&db, &root(), staff_input()).await.unwrap();
        let mut update = UserService
            .current_input(&db, &root(), created.id)
            .await
            .unwrap();
        update.username = Some("staff-renamed".to_string());
        let updated = UserService
            .update(&db, &root(), created.id, update)
            .await
            .unwrap();
        assert_eq!(updated.username, "staff-renamed");
        assert_eq!(updated.password_hash, created.password_hash);
    }

    #[tokio::test]
    async fn test_replace_permissions() {
        let db = setup_db().await;
        let created = UserService.create(&db, &root(), staff_input()).await.unwrap();
        let view_employee = Capability::new(EntityKind::Employee, Action::View);

        let stored = UserService
            .set_permissions(
                &db,
                &root(),
                created.id,
                vec![PermissionGrant::global(view_employee)],
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        let set = CapabilitySet::from_grants(
            stored
                .iter()
                .map(|grant| (grant.codename.as_str(), grant.object_id)),
        );
        assert!(set.allows(view_employee, None));

        let rejected = UserService
            .set_permissions(
                &db,
                &root(),
                created.id,
                vec![PermissionGrant {
                    codename: "attendance.fly_employee".to_string(),
                    object_id: None,
                }],
            )
            .await;
        assert!(matches!(rejected, Err(ServiceError::Validation(_))));
    }
}
