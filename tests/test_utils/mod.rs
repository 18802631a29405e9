//! Test utilities for driving the HTTP API.
//!
//! Every test gets its own in-memory SQLite database with all migrations
//! applied, and requests go through the full router with `tower::oneshot`.

use anyhow::Result;
use attendance::{
    access::Capability,
    auth::{TokenIssuer, TokenType, hash_password},
    config::AppConfig,
    models::{company, user, user::Role, user_permission},
    server::{AppState, create_app},
};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Password of every user created through [`UserFixture`].
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "s3cure-passw0rd";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Handle on a router backed by a fresh database.
pub struct TestApp {
    pub db: DatabaseConnection,
    pub tokens: Arc<TokenIssuer>,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let db = setup_test_db().await?;
        let tokens = Arc::new(TokenIssuer::new(
            b"integration-tests-signing-secret!",
            chrono::Duration::minutes(15),
            chrono::Duration::minutes(60),
        ));
        let state = AppState {
            db: db.clone(),
            config: Arc::new(AppConfig::default()),
            tokens: tokens.clone(),
        };
        Ok(Self {
            db,
            tokens,
            router: create_app(state),
        })
    }

    /// Access token for `user`.
    #[allow(dead_code)]
    pub fn token_for(&self, user: &user::Model) -> String {
        self.tokens
            .issue(user.id, &user.email, TokenType::Access)
            .expect("token signs")
    }

    /// Sends a request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    #[allow(dead_code)]
    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    #[allow(dead_code)]
    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    #[allow(dead_code)]
    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }
}

/// Creates an active company and returns its id.
#[allow(dead_code)]
pub async fn create_company(db: &DatabaseConnection, name: &str) -> Result<Uuid> {
    let now = chrono::Utc::now().fixed_offset();
    let company = company::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        address: Set(None),
        is_active: Set(true),
        subscription_id: Set(None),
        employee_limit: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(company.id)
}

/// Builder for users inserted straight into the database.
#[allow(dead_code)]
pub struct UserFixture {
    pub email: String,
    pub company_id: Option<Uuid>,
    pub is_superuser: bool,
    pub role: Option<Role>,
    pub grants: Vec<(Capability, Option<Uuid>)>,
}

#[allow(dead_code)]
impl UserFixture {
    pub fn member(email: &str, company_id: Uuid) -> Self {
        Self {
            email: email.to_string(),
            company_id: Some(company_id),
            is_superuser: false,
            role: None,
            grants: Vec::new(),
        }
    }

    pub fn superuser(email: &str) -> Self {
        Self {
            email: email.to_string(),
            company_id: None,
            is_superuser: true,
            role: None,
            grants: Vec::new(),
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn grant(mut self, capability: Capability) -> Self {
        self.grants.push((capability, None));
        self
    }

    pub fn grant_object(mut self, capability: Capability, object_id: Uuid) -> Self {
        self.grants.push((capability, Some(object_id)));
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> Result<user::Model> {
        let now = chrono::Utc::now().fixed_offset();
        let username = self
            .email
            .split('@')
            .next()
            .unwrap_or("user")
            .to_string();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(self.email),
            username: Set(username),
            mobile_no: Set(None),
            password_hash: Set(hash_password(TEST_PASSWORD)?),
            company_id: Set(self.company_id),
            is_active: Set(true),
            is_company_active: Set(true),
            is_superuser: Set(self.is_superuser),
            role: Set(self.role),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        for (capability, object_id) in self.grants {
            user_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                codename: Set(capability.codename()),
                object_id: Set(object_id),
                created_at: Set(now),
            }
            .insert(db)
            .await?;
        }
        Ok(user)
    }
}

/// Field names listed in a validation error envelope.
#[allow(dead_code)]
pub fn error_fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter_map(|detail| detail["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Messages listed in a validation error envelope.
#[allow(dead_code)]
pub fn error_messages(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter_map(|detail| detail["error"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
