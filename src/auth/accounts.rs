//! Registration, login, token refresh and logout.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::{check_password, hash_password, verify_password};
use super::tokens::{TokenError, TokenIssuer, TokenPair, TokenType};
use crate::models::{RevokedToken, User, revoked_token, user};
use crate::services::{ServiceError, ServiceResult, is_taken, now, required};
use crate::validation::{ValidationErrors, is_valid_mobile};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub mobile_no: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Public part of the user returned next to the tokens.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

fn token_error(error: TokenError) -> ServiceError {
    match error {
        TokenError::Signing => ServiceError::Internal(anyhow::anyhow!(error)),
        other => ServiceError::Unauthorized(other.to_string()),
    }
}

/// Creates an account without a company; a superuser assigns it later.
pub async fn register(db: &DatabaseConnection, request: RegisterRequest) -> ServiceResult<user::Model> {
    let mut errors = ValidationErrors::new();

    let email = required(
        &mut errors,
        "email",
        request.email.map(|e| e.trim().to_lowercase()),
    );
    if let Some(email) = &email {
        errors.check_email("email", email);
    }
    let username = required(
        &mut errors,
        "username",
        request.username.map(|u| u.trim().to_string()),
    );
    if let Some(username) = &username {
        errors.check_len("username", username, 1, 150);
    }
    let password = required(&mut errors, "password", request.password);
    if let Some(password) = &password {
        check_password(&mut errors, "password", password);
    }
    if let Some(mobile) = &request.mobile_no
        && !is_valid_mobile(mobile)
    {
        errors.add("mobile_no", "Enter a valid mobile number.");
    }

    let (Some(email), Some(username), Some(password)) = (email, username, password) else {
        return Err(errors.into());
    };

    let txn = db.begin().await?;
    if is_taken::<User, _>(
        &txn,
        Condition::all().add(user::Column::Email.eq(email.as_str())),
        user::Column::Id,
        None,
    )
    .await?
    {
        errors.add("email", "User with this email already exists.");
    }
    if is_taken::<User, _>(
        &txn,
        Condition::all().add(user::Column::Username.eq(username.as_str())),
        user::Column::Id,
        None,
    )
    .await?
    {
        errors.add("username", "A user with that username already exists.");
    }
    errors.finish()?;

    let now = now();
    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        username: Set(username),
        mobile_no: Set(request.mobile_no),
        password_hash: Set(hash_password(&password)?),
        company_id: Set(None),
        is_active: Set(true),
        is_company_active: Set(true),
        is_superuser: Set(false),
        role: Set(None),
        last_login: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(user_id = %model.id, "User registered");
    Ok(model)
}

pub async fn login(
    db: &DatabaseConnection,
    tokens: &TokenIssuer,
    request: LoginRequest,
) -> ServiceResult<LoginResponse> {
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(ValidationErrors::single(
            crate::validation::NON_FIELD_ERRORS,
            "Email and password are required.",
        )
        .into());
    };

    let found = User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await?;

    let Some(user) = found.filter(|user| user.is_active) else {
        tracing::info!("Login rejected for unknown or inactive account");
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    if !verify_password(&password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let pair = tokens.issue_pair(user.id, &user.email).map_err(token_error)?;

    let summary = UserSummary {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
    };
    let mut active: user::ActiveModel = user.into();
    active.last_login = Set(Some(now()));
    active.update(db).await?;

    tracing::info!(user_id = %summary.id, "User logged in");
    Ok(LoginResponse {
        user: summary,
        tokens: pair,
    })
}

/// Exchanges a refresh token for a new pair; the old refresh token is revoked.
pub async fn refresh(
    db: &DatabaseConnection,
    tokens: &TokenIssuer,
    request: RefreshRequest,
) -> ServiceResult<TokenPair> {
    let Some(token) = request.refresh else {
        return Err(ValidationErrors::single("refresh", "This field is required.").into());
    };
    let claims = tokens.verify(&token, TokenType::Refresh).map_err(token_error)?;

    let txn = db.begin().await?;
    if RevokedToken::find_by_id(claims.jti).one(&txn).await?.is_some() {
        return Err(ServiceError::Unauthorized("Token has been revoked.".to_string()));
    }
    let user = User::find_by_id(claims.sub)
        .one(&txn)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ServiceError::Unauthorized("User not found or inactive.".to_string()))?;

    revoke(&txn, &claims).await?;
    let pair = tokens.issue_pair(user.id, &user.email).map_err(token_error)?;
    txn.commit().await?;
    Ok(pair)
}

/// Revokes the caller's refresh token.
///
/// Like [`refresh`], this also drops revocations whose token has already expired.
pub async fn logout(
    db: &DatabaseConnection,
    tokens: &TokenIssuer,
    user_id: Uuid,
    request: RefreshRequest,
) -> ServiceResult<()> {
    let Some(token) = request.refresh else {
        return Err(ValidationErrors::single("refresh", "This field is required.").into());
    };
    let claims = tokens
        .verify(&token, TokenType::Refresh)
        .map_err(|_| ValidationErrors::single("refresh", "Token is invalid or expired."))?;
    if claims.sub != user_id {
        return Err(ValidationErrors::single("refresh", "Token is invalid or expired.").into());
    }

    let txn = db.begin().await?;
    if RevokedToken::find_by_id(claims.jti).one(&txn).await?.is_none() {
        revoke(&txn, &claims).await?;
    }
    txn.commit().await?;

    tracing::info!(user_id = %user_id, "User logged out");
    Ok(())
}

async fn revoke(
    txn: &sea_orm::DatabaseTransaction,
    claims: &super::Claims,
) -> ServiceResult<()> {
    let now = now();
    let expires_at = claims
        .expires_at()
        .map(|at| at.fixed_offset())
        .unwrap_or(now);
    revoked_token::ActiveModel {
        jti: Set(claims.jti),
        expires_at: Set(expires_at),
        revoked_at: Set(now),
    }
    .insert(txn)
    .await?;

    // An expired token fails verification before the revocation list is consulted.
    let purged = RevokedToken::delete_many()
        .filter(revoked_token::Column::ExpiresAt.lt(now))
        .exec(txn)
        .await?
        .rows_affected;
    if purged > 0 {
        tracing::debug!(purged, "Expired token revocations purged");
    }
    Ok(())
}

/// Creates a superuser, or promotes and re-activates an existing account with
/// the same email. Returns the user and whether it was newly created.
pub async fn create_superuser(
    db: &DatabaseConnection,
    email: &str,
    username: &str,
    password: &str,
) -> ServiceResult<(user::Model, bool)> {
    let email = email.trim().to_lowercase();
    let existing = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;

    let (account, created) = match existing {
        Some(account) => (account, false),
        None => {
            let account = register(
                db,
                RegisterRequest {
                    email: Some(email),
                    username: Some(username.to_string()),
                    password: Some(password.to_string()),
                    mobile_no: None,
                },
            )
            .await?;
            (account, true)
        }
    };

    let mut active: user::ActiveModel = account.into();
    if !created {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", password);
        errors.finish()?;
        active.password_hash = Set(hash_password(password)?);
    }
    active.is_superuser = Set(true);
    active.is_active = Set(true);
    active.updated_at = Set(now());
    let model = active.update(db).await?;

    tracing::info!(user_id = %model.id, created, "Superuser ready");
    Ok((model, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::setup_db;
    use chrono::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"accounts-test-secret", Duration::minutes(5), Duration::minutes(30))
    }

    fn registration(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            password: Some("s3cure-pass".to_string()),
            mobile_no: None,
        }
    }

    fn credentials(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let db = setup_db().await;
        let user = register(&db, registration("Ana@Example.com", "ana")).await.unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(user.company_id.is_none());
        assert!(!user.is_superuser);

        match register(&db, registration("ana@example.com", "ana")).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("email"));
                assert!(errors.has("username"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let db = setup_db().await;
        register(&db, registration("ana@example.com", "ana")).await.unwrap();

        let response = login(&db, &issuer(), credentials("ana@example.com", "s3cure-pass"))
            .await
            .unwrap();
        assert_eq!(response.user.username, "ana");

        match login(&db, &issuer(), credentials("ana@example.com", "wrong-pass")).await {
            Err(ServiceError::Unauthorized(message)) => assert_eq!(message, INVALID_CREDENTIALS),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_revokes() {
        let db = setup_db().await;
        let tokens = issuer();
        register(&db, registration("ana@example.com", "ana")).await.unwrap();
        let response = login(&db, &tokens, credentials("ana@example.com", "s3cure-pass"))
            .await
            .unwrap();

        let old_refresh = response.tokens.refresh.clone();
        let rotated = refresh(
            &db,
            &tokens,
            RefreshRequest {
                refresh: Some(old_refresh.clone()),
            },
        )
        .await
        .unwrap();
        assert_ne!(rotated.refresh, old_refresh);

        match refresh(&db, &tokens, RefreshRequest { refresh: Some(old_refresh) }).await {
            Err(ServiceError::Unauthorized(message)) => assert_eq!(message, "Token has been revoked."),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let db = setup_db().await;
        let tokens = issuer();
        let user = register(&db, registration("ana@example.com", "ana")).await.unwrap();
        let response = login(&db, &tokens, credentials("ana@example.com", "s3cure-pass"))
            .await
            .unwrap();
        let refresh_token = response.tokens.refresh;

        logout(
            &db,
            &tokens,
            user.id,
            RefreshRequest {
                refresh: Some(refresh_token.clone()),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            refresh(&db, &tokens, RefreshRequest { refresh: Some(refresh_token) }).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_create_superuser_promotes_existing_account() {
        let db = setup_db().await;
        let (created, is_new) = create_superuser(&db, "root@example.com", "root", "root-pass-1")
            .await
            .unwrap();
        assert!(is_new);
        assert!(created.is_superuser);

        register(&db, registration("ana@example.com", "ana")).await.unwrap();
        let (promoted, is_new) = create_superuser(&db, "ana@example.com", "ignored", "new-pass-22")
            .await
            .unwrap();
        assert!(!is_new);
        assert!(promoted.is_superuser);
        assert_eq!(promoted.username, "ana");
        assert!(verify_password("new-pass-22", &promoted.password_hash));
    }

    #[tokio::test]
    async fn test_revoking_purges_expired_entries() {
        let db = setup_db().await;
        let tokens = issuer();
        let user = register(&db, registration("ana@example.com", "ana")).await.unwrap();

        let stale = Uuid::new_v4();
        let long_ago = now() - Duration::hours(2);
        revoked_token::ActiveModel {
            jti: Set(stale),
            expires_at: Set(long_ago + Duration::minutes(30)),
            revoked_at: Set(long_ago),
        }
        .insert(&db)
        .await
        .unwrap();

        let response = login(&db, &tokens, credentials("ana@example.com", "s3cure-pass"))
            .await
            .unwrap();
        let claims = tokens
            .verify(&response.tokens.refresh, TokenType::Refresh)
            .unwrap();
        logout(
            &db,
            &tokens,
            user.id,
            RefreshRequest {
                refresh: Some(response.tokens.refresh),
            },
        )
        .await
        .unwrap();

        assert!(RevokedToken::find_by_id(stale).one(&db).await.unwrap().is_none());
        assert!(RevokedToken::find_by_id(claims.jti).one(&db).await.unwrap().is_some());
    }
}
