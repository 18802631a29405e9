//! # Authentication Handlers
//!
//! Registration, login, token refresh, logout and the current-user endpoint.

use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use sea_orm::EntityTrait;

use super::response::ApiResponse;
use crate::access::Caller;
use crate::auth::TokenPair;
use crate::auth::accounts::{
    self, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, UserSummary,
};
use crate::error::{ApiError, unauthorized};
use crate::models::{User, user};
use crate::server::AppState;

/// Create an account (public)
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserSummary>>), ApiError> {
    let Json(request) = payload?;
    let user = accounts::register(&state.db, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully.",
            UserSummary {
                id: user.id,
                email: user.email,
                username: user.username,
            },
        )),
    ))
}

/// Exchange credentials for an access/refresh token pair (public)
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let Json(request) = payload?;
    let response = accounts::login(&state.db, &state.tokens, request).await?;
    Ok(Json(ApiResponse::with_message("Login successful.", response)))
}

/// Rotate a refresh token (public)
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenPair>>, ApiError> {
    let Json(request) = payload?;
    let pair = accounts::refresh(&state.db, &state.tokens, request).await?;
    Ok(Json(ApiResponse::success(pair)))
}

/// Revoke the caller's refresh token
pub async fn logout(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    accounts::logout(&state.db, &state.tokens, caller.user_id, request).await?;
    Ok(StatusCode::RESET_CONTENT)
}

/// The authenticated user's own account
pub async fn me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ApiResponse<user::Model>>, ApiError> {
    let user = User::find_by_id(caller.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| unauthorized(Some("User not found or inactive.")))?;
    Ok(Json(ApiResponse::success(user)))
}
