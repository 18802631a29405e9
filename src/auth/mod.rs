//! # Authentication
//!
//! Bearer JWT authentication for every route under `/api` except the public
//! auth endpoints. The middleware resolves the token into a [`Caller`] once per
//! request; handlers take it as an extractor.

pub mod accounts;
pub mod password;
pub mod tokens;

pub use password::{hash_password, verify_password};
pub use tokens::{Claims, TokenError, TokenIssuer, TokenPair, TokenType};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::access::{Caller, CapabilitySet};
use crate::error::{ApiError, unauthorized};
use crate::models::{Company, User, UserPermission, user_permission};
use crate::server::AppState;
use crate::services::{ServiceError, ServiceResult};

/// Authentication middleware that validates the access token and attaches the caller.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;

    let claims = state
        .tokens
        .verify(token, TokenType::Access)
        .map_err(|e| unauthorized(Some(&e.to_string())))?;

    let caller = load_caller(&state.db, claims.sub).await?;
    tracing::debug!(
        user_id = %caller.user_id,
        company_id = ?caller.company_id,
        is_superuser = caller.is_superuser,
        "Authenticated request"
    );

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Authentication credentials were not provided.")))
        .and_then(|value| {
            value
                .to_str()
                .map_err(|_| unauthorized(Some("Invalid Authorization header.")))
        })
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme.")))
        })
}

/// Builds the caller identity of an active user: company state and grants.
pub async fn load_caller(db: &DatabaseConnection, user_id: Uuid) -> ServiceResult<Caller> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ServiceError::Unauthorized("User not found or inactive.".to_string()))?;

    let company_active = match user.company_id {
        Some(company_id) => {
            let company_is_active = Company::find_by_id(company_id)
                .one(db)
                .await?
                .is_some_and(|company| company.is_active);
            company_is_active && user.is_company_active
        }
        None => user.is_company_active,
    };

    let grants = UserPermission::find()
        .filter(user_permission::Column::UserId.eq(user.id))
        .all(db)
        .await?;
    let capabilities = CapabilitySet::from_grants(
        grants
            .iter()
            .map(|grant| (grant.codename.as_str(), grant.object_id)),
    );

    Ok(Caller {
        user_id: user.id,
        email: user.email,
        company_id: user.company_id,
        company_active,
        is_superuser: user.is_superuser,
        role: user.role,
        capabilities,
    })
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication credentials were not provided.")))
    }
}
