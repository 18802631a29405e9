//! # Record Handlers
//!
//! Generic list/create/retrieve/update/partial-update/delete endpoints shared by
//! every record kind. Each request runs the inactive-company check and the
//! permission gate before the record service is called.

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{Method, StatusCode},
    response::Json,
    routing::get,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::response::ApiResponse;
use crate::access::{Caller, authorize};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::{RecordService, ServiceError};

/// Routes `path` and `path/{id}` to the handlers of `S`.
pub fn resource<S>(path: &str) -> Router<AppState>
where
    S: RecordService + Default,
{
    Router::new()
        .route(path, get(list::<S>).post(create::<S>))
        .route(
            &format!("{path}/{{id}}"),
            get(retrieve::<S>)
                .put(update::<S>)
                .patch(partial_update::<S>)
                .delete(destroy::<S>),
        )
}

/// Inactive-company check, then the capability check for `method`.
pub(crate) fn gate<S: RecordService>(
    caller: &Caller,
    method: &Method,
    object_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if S::KIND.is_tenant_scoped() {
        caller.ensure_active()?;
    }
    authorize(caller, S::KIND, method, object_id)?;
    Ok(())
}

/// Malformed ids cannot name a row, so they read as a missing record.
pub(crate) fn parse_id<S: RecordService>(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::NotFound(S::KIND.label()).into())
}

pub async fn list<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
) -> Result<Json<ApiResponse<Vec<S::Record>>>, ApiError>
where
    S: RecordService + Default,
{
    gate::<S>(&caller, &method, None)?;
    let records = S::default().list(&state.db, &caller).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} list retrieved successfully.", S::KIND.label()),
        records,
    )))
}

pub async fn create<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    payload: Result<Json<S::Input>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<S::Record>>), ApiError>
where
    S: RecordService + Default,
{
    gate::<S>(&caller, &method, None)?;
    let Json(input) = payload?;
    let record = S::default().create(&state.db, &caller, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("{} created successfully.", S::KIND.label()),
            record,
        )),
    ))
}

pub async fn retrieve<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<S::Record>>, ApiError>
where
    S: RecordService + Default,
{
    let id = parse_id::<S>(&id)?;
    gate::<S>(&caller, &method, Some(id))?;
    let record = S::default().get(&state.db, &caller, id).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} retrieved successfully.", S::KIND.label()),
        record,
    )))
}

pub async fn update<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<S::Input>, JsonRejection>,
) -> Result<Json<ApiResponse<S::Record>>, ApiError>
where
    S: RecordService + Default,
{
    let id = parse_id::<S>(&id)?;
    gate::<S>(&caller, &method, Some(id))?;
    let Json(input) = payload?;
    let record = S::default().update(&state.db, &caller, id, input).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} updated successfully.", S::KIND.label()),
        record,
    )))
}

pub async fn partial_update<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<ApiResponse<S::Record>>, ApiError>
where
    S: RecordService + Default,
{
    let id = parse_id::<S>(&id)?;
    gate::<S>(&caller, &method, Some(id))?;
    let Json(changes) = payload?;
    let record = S::default().patch(&state.db, &caller, id, changes).await?;
    Ok(Json(ApiResponse::with_message(
        format!("{} partially updated successfully.", S::KIND.label()),
        record,
    )))
}

pub async fn destroy<S>(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: RecordService + Default,
{
    let id = parse_id::<S>(&id)?;
    gate::<S>(&caller, &method, Some(id))?;
    S::default().delete(&state.db, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Action, Capability, CapabilitySet, EntityKind};
    use crate::services::{DeviceService, SubscriptionService};

    #[test]
    fn test_parse_id_reports_missing_record() {
        let err = parse_id::<DeviceService>("not-a-uuid").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, Box::from("Device not found."));
    }

    #[test]
    fn test_gate_requires_capability() {
        let mut caller = Caller::test_member(Uuid::new_v4());
        let err = gate::<DeviceService>(&caller, &Method::GET, None).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        caller
            .capabilities
            .grant(Capability::new(EntityKind::Device, Action::View));
        assert!(gate::<DeviceService>(&caller, &Method::GET, None).is_ok());
        assert!(gate::<DeviceService>(&caller, &Method::DELETE, None).is_err());
    }

    #[test]
    fn test_gate_blocks_inactive_company_except_subscriptions() {
        let mut capabilities = CapabilitySet::new();
        capabilities.grant(Capability::new(EntityKind::Device, Action::View));
        capabilities.grant(Capability::new(EntityKind::Subscription, Action::View));
        let caller = Caller {
            company_active: false,
            capabilities,
            ..Caller::test_member(Uuid::new_v4())
        };

        let err = gate::<DeviceService>(&caller, &Method::GET, None).unwrap_err();
        assert_eq!(err.message, Box::from("Your company or account is inactive."));
        assert!(gate::<SubscriptionService>(&caller, &Method::GET, None).is_ok());
    }
}
