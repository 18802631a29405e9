//! # Tests for Handlers
//!
//! This module contains unit tests for API handlers.

use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::handlers::{health, root};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Duration;
use sea_orm::DatabaseConnection;

fn disconnected_state() -> AppState {
    AppState {
        db: DatabaseConnection::default(),
        config: Arc::new(AppConfig::default()),
        tokens: Arc::new(TokenIssuer::new(
            b"handler-tests-secret",
            Duration::minutes(1),
            Duration::minutes(2),
        )),
    }
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "attendance");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_reports_store_failure() {
    let result = health(State(disconnected_state())).await;

    let error = result.unwrap_err();
    assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error.error_type, Box::from("ServerError"));
}
