//! Capability grants of a user. Superusers only.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::Deserialize;

use super::records::parse_id;
use super::response::ApiResponse;
use crate::access::Caller;
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::UserService;
use crate::services::user::PermissionGrant;

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<PermissionGrant>,
}

pub async fn get_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PermissionGrant>>>, ApiError> {
    let id = parse_id::<UserService>(&id)?;
    let grants = UserService.permissions(&state.db, &caller, id).await?;
    Ok(Json(ApiResponse::success(grants)))
}

pub async fn set_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<SetPermissionsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<PermissionGrant>>>, ApiError> {
    let id = parse_id::<UserService>(&id)?;
    let Json(request) = payload?;
    let grants = UserService
        .set_permissions(&state.db, &caller, id, request.permissions)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Permissions updated successfully.",
        grants,
    )))
}
