//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the attendance API.

pub mod attendance_logs;
pub mod auth;
pub mod records;
pub mod response;
pub mod users;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::db;
use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
}

/// Liveness plus a `SELECT 1` against the store
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    db::health_check(&state.db).await?;
    Ok(Json(HealthStatus {
        status: "ok",
        database: "ok",
    }))
}

#[cfg(test)]
mod tests;
