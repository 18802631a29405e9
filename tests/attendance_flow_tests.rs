//! Punch recording and the per-employee attendance log.

use anyhow::Result;
use attendance::access::{Capability, EntityKind};
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestApp, UserFixture, create_company, error_messages};

fn operator(email: &str, company_id: Uuid) -> UserFixture {
    Capability::all()
        .filter(|capability| {
            matches!(
                capability.kind,
                EntityKind::Employee | EntityKind::AttendanceLog
            )
        })
        .fold(UserFixture::member(email, company_id), UserFixture::grant)
}

async fn hire(app: &TestApp, token: &str, employee_id: &str, contact: &str) -> Result<String> {
    let (status, body) = app
        .post(
            "/api/employees",
            token,
            json!({"employee_id": employee_id, "first_name": "Nadia", "contact_number": contact}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Ok(body["data"]["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn punches_are_listed_per_employee_newest_first() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let user = operator("ops@acme.test", acme).insert(&app.db).await?;
    let token = app.token_for(&user);

    let nadia = hire(&app, &token, "EMP001", "01712345678").await?;
    let other = hire(&app, &token, "EMP002", "01812345678").await?;

    for (employee, at, status) in [
        (&nadia, "2024-05-01T09:00:00+06:00", "IN"),
        (&nadia, "2024-05-01T18:00:00+06:00", "OUT"),
        (&other, "2024-05-01T09:05:00+06:00", "IN"),
    ] {
        let (code, body) = app
            .post(
                "/api/attendance-logs",
                &token,
                json!({"employee_id": employee, "punch_datetime": at, "in_out_status": status}),
            )
            .await?;
        assert_eq!(code, StatusCode::CREATED, "{body}");
    }

    let (status, body) = app
        .get(&format!("/api/attendance-logs/by-employee/{nadia}"), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Attendance logs retrieved successfully.");
    let punches = body["data"].as_array().unwrap();
    assert_eq!(punches.len(), 2);
    assert_eq!(punches[0]["in_out_status"], "OUT");
    assert_eq!(punches[1]["in_out_status"], "IN");
    assert!(punches.iter().all(|p| p["employee_id"] == nadia.as_str()));
    Ok(())
}

#[tokio::test]
async fn duplicate_punch_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let user = operator("ops@acme.test", acme).insert(&app.db).await?;
    let token = app.token_for(&user);
    let nadia = hire(&app, &token, "EMP001", "01712345678").await?;

    let punch = json!({"employee_id": nadia, "punch_datetime": "2024-05-01T09:00:00+06:00"});
    let (status, _) = app.post("/api/attendance-logs", &token, punch.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post("/api/attendance-logs", &token, punch).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_messages(&body)
        .contains(&"The fields employee, punch_datetime must make a unique set.".to_string()));
    Ok(())
}

#[tokio::test]
async fn same_instant_in_another_offset_is_a_duplicate() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let user = operator("ops@acme.test", acme).insert(&app.db).await?;
    let token = app.token_for(&user);
    let nadia = hire(&app, &token, "EMP001", "01712345678").await?;

    let (status, body) = app
        .post(
            "/api/attendance-logs",
            &token,
            json!({"employee_id": nadia, "punch_datetime": "2024-05-01T09:00:00+06:00"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = app
        .post(
            "/api/attendance-logs",
            &token,
            json!({"employee_id": nadia, "punch_datetime": "2024-05-01T03:00:00+00:00"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(error_messages(&body)
        .contains(&"The fields employee, punch_datetime must make a unique set.".to_string()));
    Ok(())
}

#[tokio::test]
async fn punches_across_offsets_sort_by_instant() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let user = operator("ops@acme.test", acme).insert(&app.db).await?;
    let token = app.token_for(&user);
    let nadia = hire(&app, &token, "EMP001", "01712345678").await?;

    // 08:00 UTC is later than 09:00+06:00 (03:00 UTC) despite the smaller wall clock.
    for (at, status) in [
        ("2024-05-01T09:00:00+06:00", "IN"),
        ("2024-05-01T08:00:00+00:00", "OUT"),
    ] {
        let (code, body) = app
            .post(
                "/api/attendance-logs",
                &token,
                json!({"employee_id": nadia, "punch_datetime": at, "in_out_status": status}),
            )
            .await?;
        assert_eq!(code, StatusCode::CREATED, "{body}");
    }

    let (status, body) = app
        .get(&format!("/api/attendance-logs/by-employee/{nadia}"), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let punches = body["data"].as_array().unwrap();
    assert_eq!(punches[0]["in_out_status"], "OUT");
    assert_eq!(punches[1]["in_out_status"], "IN");
    Ok(())
}

#[tokio::test]
async fn other_company_employee_log_is_forbidden() -> Result<()> {
    let app = TestApp::new().await?;
    let acme = create_company(&app.db, "Acme Garments").await?;
    let globex = create_company(&app.db, "Globex Textiles").await?;
    let acme_ops = operator("ops@acme.test", acme).insert(&app.db).await?;
    let globex_ops = operator("ops@globex.test", globex).insert(&app.db).await?;

    let nadia = hire(&app, &app.token_for(&acme_ops), "EMP001", "01712345678").await?;

    let (status, _) = app
        .get(
            &format!("/api/attendance-logs/by-employee/{nadia}"),
            &app.token_for(&globex_ops),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/attendance-logs",
            &app.token_for(&globex_ops),
            json!({"employee_id": nadia}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"][0]["field"] == "employee_id");
    Ok(())
}
