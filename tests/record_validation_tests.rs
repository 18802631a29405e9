//! Validation rules observed through the HTTP API.

use anyhow::Result;
use attendance::{
    access::{Capability, EntityKind},
    models::user::Role,
};
use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestApp, UserFixture, create_company, error_fields, error_messages};

/// A company member holding every capability on `kinds`.
fn manager(email: &str, company_id: Uuid, kinds: &[EntityKind]) -> UserFixture {
    Capability::all()
        .filter(|capability| kinds.contains(&capability.kind))
        .fold(UserFixture::member(email, company_id), UserFixture::grant)
}

async fn hr_token(app: &TestApp) -> Result<String> {
    let company = create_company(&app.db, "Acme Garments").await?;
    let user = manager(
        "hr@acme.test",
        company,
        &[EntityKind::Employee, EntityKind::Device, EntityKind::Shift],
    )
    .insert(&app.db)
    .await?;
    Ok(app.token_for(&user))
}

fn employee(employee_id: &str, contact: &str) -> Value {
    json!({
        "employee_id": employee_id,
        "first_name": "Rahim",
        "last_name": "Uddin",
        "contact_number": contact,
        "date_of_joining": "2022-03-01",
        "date_of_birth": "1990-06-15",
    })
}

#[tokio::test]
async fn short_contact_number_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, body) = app
        .post("/api/employees", &token, employee("EMP001", "12345"))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "ValidationError");
    assert!(error_fields(&body).contains(&"contact_number".to_string()));
    assert!(error_messages(&body)
        .contains(&"Contact number must be between 10 and 15 digits.".to_string()));
    Ok(())
}

#[tokio::test]
async fn birth_date_must_precede_joining() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let mut payload = employee("EMP001", "01712345678");
    payload["date_of_birth"] = json!("2022-03-01");

    let (status, body) = app.post("/api/employees", &token, payload).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_messages(&body)
        .contains(&"Date of birth must be before the date of joining.".to_string()));
    Ok(())
}

#[tokio::test]
async fn duplicate_employee_id_within_company_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, _) = app
        .post("/api/employees", &token, employee("EMP001", "01712345678"))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/employees", &token, employee("EMP001", "01812345678"))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_messages(&body)
        .contains(&"An employee with this ID already exists in the company.".to_string()));
    Ok(())
}

#[tokio::test]
async fn staff_patch_is_limited_to_contact_fields() -> Result<()> {
    let app = TestApp::new().await?;
    let company = create_company(&app.db, "Acme Garments").await?;
    let hr = manager("hr@acme.test", company, &[EntityKind::Employee])
        .insert(&app.db)
        .await?;
    let staff = manager("staff@acme.test", company, &[EntityKind::Employee])
        .role(Role::Staff)
        .insert(&app.db)
        .await?;

    let (_, body) = app
        .post(
            "/api/employees",
            &app.token_for(&hr),
            employee("EMP001", "01712345678"),
        )
        .await?;
    let uri = format!("/api/employees/{}", body["data"]["id"].as_str().unwrap());

    let (status, body) = app
        .patch(&uri, &app.token_for(&staff), json!({"first_name": "Karim"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_messages(&body).contains(&"No valid fields to update.".to_string()));

    let (status, body) = app
        .patch(
            &uri,
            &app.token_for(&staff),
            json!({"first_name": "Karim", "contact_number": "01912345678"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Employee partially updated successfully.");
    assert_eq!(body["data"]["contact_number"], "01912345678");
    assert_eq!(body["data"]["first_name"], "Rahim");
    Ok(())
}

#[tokio::test]
async fn device_port_must_be_in_range() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, body) = app
        .post(
            "/api/devices",
            &token,
            json!({
                "device_id": "GATE-1",
                "location": "Main gate",
                "ip_address": "192.168.1.20",
                "port": 70000,
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["port".to_string()]);
    Ok(())
}

#[tokio::test]
async fn device_ip_is_unique_per_company() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, _) = app
        .post(
            "/api/devices",
            &token,
            json!({"device_id": "GATE-1", "location": "Main gate", "ip_address": "192.168.1.20"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/api/devices",
            &token,
            json!({"device_id": "GATE-2", "location": "Back gate", "ip_address": "192.168.1.20"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), vec!["non_field_errors".to_string()]);
    assert_eq!(
        error_messages(&body),
        vec!["The fields company, ip_address must make a unique set.".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn shift_end_must_follow_start() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, body) = app
        .post(
            "/api/shifts",
            &token,
            json!({"name": "Night", "start_time": "22:00:00", "end_time": "06:00:00"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_messages(&body).contains(&"End time must be after start time.".to_string()));

    let (status, body) = app
        .post(
            "/api/shifts",
            &token,
            json!({"name": "Day", "start_time": "09:00:00", "end_time": "17:00:00", "break_minutes": 60}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["duration_minutes"], 480);
    Ok(())
}

#[tokio::test]
async fn created_record_reads_back_unchanged() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, created) = app
        .post(
            "/api/devices",
            &token,
            json!({
                "device_id": "GATE-1",
                "location": "Main gate",
                "description": "Turnstile reader",
                "ip_address": "192.168.1.20",
                "serial_number": "ZK-0000012345",
                "port": 4370,
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Device created successfully.");

    let id = created["data"]["id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("/api/devices/{id}"), &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"], created["data"]);
    assert_eq!(fetched["data"]["is_synced"], false);
    Ok(())
}

/// Creates a record at `uri` and checks that a GET returns the same body.
async fn assert_reads_back(app: &TestApp, token: &str, uri: &str, payload: Value) -> Result<Value> {
    let (status, created) = app.post(uri, token, payload).await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let id = created["data"]["id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("{uri}/{id}"), token).await?;
    assert_eq!(status, StatusCode::OK, "{fetched}");
    assert_eq!(fetched["data"], created["data"], "{uri}");
    Ok(created["data"].clone())
}

#[tokio::test]
async fn linked_records_read_back_unchanged() -> Result<()> {
    let app = TestApp::new().await?;
    let company = create_company(&app.db, "Acme Garments").await?;
    let user = manager(
        "hr@acme.test",
        company,
        &[
            EntityKind::Employee,
            EntityKind::Shift,
            EntityKind::Schedule,
            EntityKind::AttendanceLog,
        ],
    )
    .insert(&app.db)
    .await?;
    let token = app.token_for(&user);

    let mut payload = employee("EMP001", "01712345678");
    payload["position"] = json!("Line supervisor");
    payload["blood_group"] = json!("O+");
    let rahim = assert_reads_back(&app, &token, "/api/employees", payload).await?;
    assert_eq!(rahim["full_name"], "Rahim Uddin");
    assert_eq!(rahim["date_of_joining"], "2022-03-01");

    let day = assert_reads_back(
        &app,
        &token,
        "/api/shifts",
        json!({"name": "Day", "start_time": "09:00:00", "end_time": "17:00:00", "break_minutes": 45}),
    )
    .await?;
    assert_eq!(day["duration_minutes"], 480);

    let schedule = assert_reads_back(
        &app,
        &token,
        "/api/schedules",
        json!({
            "employee_id": rahim["id"],
            "shift_id": day["id"],
            "workdays": ["MON", "TUE", "WED"],
        }),
    )
    .await?;
    assert_eq!(schedule["workdays"], json!(["MON", "TUE", "WED"]));

    let punch = assert_reads_back(
        &app,
        &token,
        "/api/attendance-logs",
        json!({
            "employee_id": rahim["id"],
            "punch_datetime": "2024-05-01T09:00:00+06:00",
            "in_out_status": "IN",
            "location_name": "Main gate",
            "latitude": 23.8103,
            "longitude": 90.4125,
        }),
    )
    .await?;
    assert_eq!(punch["latitude"], 23.8103);
    assert_eq!(punch["longitude"], 90.4125);
    Ok(())
}

#[tokio::test]
async fn malformed_id_is_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (status, body) = app.get("/api/devices/not-a-uuid", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Device not found.");

    let (status, _) = app
        .get(&format!("/api/devices/{}", Uuid::new_v4()), &token)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_returns_no_content() -> Result<()> {
    let app = TestApp::new().await?;
    let token = hr_token(&app).await?;

    let (_, created) = app
        .post(
            "/api/shifts",
            &token,
            json!({"name": "Day", "start_time": "09:00:00", "end_time": "17:00:00"}),
        )
        .await?;
    let uri = format!("/api/shifts/{}", created["data"]["id"].as_str().unwrap());

    let (status, body) = app
        .request(axum::http::Method::DELETE, &uri, Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get(&uri, &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
