//! The capability gate in front of every record route.

use anyhow::Result;
use attendance::access::{Action, Capability, EntityKind};
use axum::http::{Method, StatusCode};
use serde_json::json;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestApp, UserFixture, create_company, error_fields};

fn department(action: Action) -> Capability {
    Capability::new(EntityKind::Department, action)
}

#[tokio::test]
async fn missing_capability_is_forbidden() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let viewer = UserFixture::member("viewer@acme.test", acme)
        .grant(department(Action::View))
        .insert(&app.db)
        .await?;
    let token = app.token_for(&viewer);

    let (status, _) = app.get("/api/departments", &token).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/departments", &token, json!({"name": "Finance"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action."
    );

    let (status, _) = app.get("/api/employees", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn per_object_grant_covers_only_that_record() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let admin = UserFixture::member("admin@acme.test", acme)
        .grant(department(Action::Add))
        .insert(&app.db)
        .await?;
    let admin_token = app.token_for(&admin);

    let (_, finance) = app
        .post("/api/departments", &admin_token, json!({"name": "Finance"}))
        .await?;
    let (_, sales) = app
        .post("/api/departments", &admin_token, json!({"name": "Sales"}))
        .await?;
    let finance_id: uuid::Uuid = finance["data"]["id"].as_str().unwrap().parse()?;
    let sales_id = sales["data"]["id"].as_str().unwrap();

    let auditor = UserFixture::member("auditor@acme.test", acme)
        .grant_object(department(Action::View), finance_id)
        .insert(&app.db)
        .await?;
    let token = app.token_for(&auditor);

    let (status, body) = app
        .get(&format!("/api/departments/{finance_id}"), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Finance");

    let (status, _) = app
        .get(&format!("/api/departments/{sales_id}"), &token)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/departments", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unsupported_method_is_rejected_by_the_router() -> Result<()> {
    let app = TestApp::new().await?;
    let root = UserFixture::superuser("root@platform.test")
        .insert(&app.db)
        .await?;

    let (status, _) = app
        .request(
            Method::TRACE,
            "/api/departments",
            Some(&app.token_for(&root)),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn superuser_manages_grants() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let root = UserFixture::superuser("root@platform.test")
        .insert(&app.db)
        .await?;
    let member = UserFixture::member("member@acme.test", acme)
        .insert(&app.db)
        .await?;
    let member_token = app.token_for(&member);
    let uri = format!("/api/users/{}/permissions", member.id);

    let (status, _) = app.get("/api/departments", &member_token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&root)),
            Some(json!({"permissions": [
                {"codename": "attendance.view_department"},
                {"codename": "attendance.fly_department"},
            ]})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["permissions[1]".to_string()]);

    let (status, body) = app
        .request(
            Method::PUT,
            &uri,
            Some(&app.token_for(&root)),
            Some(json!({"permissions": [{"codename": "attendance.view_department"}]})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Permissions updated successfully.");

    let (status, _) = app.get("/api/departments", &member_token).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&uri, &member_token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get(&uri, &app.token_for(&root)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["codename"], "attendance.view_department");
    Ok(())
}
