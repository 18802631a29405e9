//! Integration tests for registration, login and the token lifecycle.

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TEST_PASSWORD, TestApp, UserFixture, create_company, error_fields};

async fn register(app: &TestApp, email: &str, username: &str) -> Result<(StatusCode, Value)> {
    app.request(
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"email": email, "username": username, "password": TEST_PASSWORD})),
    )
    .await
}

async fn login(app: &TestApp, email: &str, password: &str) -> Result<(StatusCode, Value)> {
    app.request(
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await
}

#[tokio::test]
async fn register_login_and_fetch_profile() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = register(&app, "New.Hire@Example.com", "newhire").await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "User registered successfully.");
    assert_eq!(body["data"]["email"], "new.hire@example.com");

    let (status, body) = login(&app, "new.hire@example.com", TEST_PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful.");
    assert_eq!(body["data"]["user"]["username"], "newhire");
    assert_eq!(body["data"]["access_expires_in"], 900);
    let access = body["data"]["access"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/auth/me", &access).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "new.hire@example.com");
    assert!(body["data"]["company_id"].is_null());
    assert!(body["data"].get("password_hash").is_none());
    assert!(!body["data"]["last_login"].is_null());
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let (status, _) = register(&app, "dup@example.com", "dup").await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "dup@example.com", "other").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["email".to_string()]);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::new().await?;
    register(&app, "user@example.com", "user").await?;

    let (status, body) = login(&app, "user@example.com", "not-the-password").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_type"], "AuthenticationFailed");
    assert_eq!(body["message"], "Invalid email or password.");

    let (status, _) = login(&app, "nobody@example.com", TEST_PASSWORD).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_valid_access_token() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app
        .request(Method::GET, "/api/employees", None, None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication credentials were not provided.");

    let (status, _) = app.get("/api/employees", "garbage.token.value").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    register(&app, "user@example.com", "user").await?;
    let (_, body) = login(&app, "user@example.com", TEST_PASSWORD).await?;
    let refresh = body["data"]["refresh"].as_str().unwrap();

    let (status, body) = app.get("/api/auth/me", refresh).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has wrong type.");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() -> Result<()> {
    let app = TestApp::new().await?;
    register(&app, "user@example.com", "user").await?;
    let (_, body) = login(&app, "user@example.com", TEST_PASSWORD).await?;
    let access = body["data"]["access"].as_str().unwrap().to_string();
    let first_refresh = body["data"]["refresh"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh": first_refresh})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let second_refresh = body["data"]["refresh"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh": first_refresh})),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has been revoked.");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/logout",
            Some(&access),
            Some(json!({"refresh": second_refresh})),
        )
        .await?;
    assert_eq!(status, StatusCode::RESET_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({"refresh": second_refresh})),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn deactivated_company_blocks_members() -> Result<()> {
    use attendance::access::{Action, Capability, EntityKind};
    use attendance::models::{Company, company};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let member = UserFixture::member("hr@acme.test", acme)
        .grant(Capability::new(EntityKind::Employee, Action::View))
        .grant(Capability::new(EntityKind::Subscription, Action::View))
        .insert(&app.db)
        .await?;
    let token = app.token_for(&member);

    let (status, _) = app.get("/api/employees", &token).await?;
    assert_eq!(status, StatusCode::OK);

    let model = Company::find_by_id(acme).one(&app.db).await?.unwrap();
    let mut active: company::ActiveModel = model.into();
    active.is_active = Set(false);
    active.update(&app.db).await?;

    let (status, body) = app.get("/api/employees", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Your company or account is inactive.");

    let (status, _) = app.get("/api/subscriptions", &token).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
