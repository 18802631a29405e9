//! Punches of a single employee.

use axum::{
    extract::{Path, State},
    http::Method,
    response::Json,
};

use super::records::{gate, parse_id};
use super::response::ApiResponse;
use crate::access::Caller;
use crate::error::ApiError;
use crate::models::attendance_log;
use crate::server::AppState;
use crate::services::{AttendanceLogService, EmployeeService};

/// `GET /api/attendance-logs/by-employee/{employee_id}`, newest punch first.
///
/// Needs the attendance-log view capability; the employee must belong to the
/// caller's company.
pub async fn by_employee(
    State(state): State<AppState>,
    method: Method,
    caller: Caller,
    Path(employee_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<attendance_log::Model>>>, ApiError> {
    let employee_id = parse_id::<EmployeeService>(&employee_id)?;
    gate::<AttendanceLogService>(&caller, &method, None)?;

    let logs = AttendanceLogService
        .list_for_employee(&state.db, &caller, employee_id)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Attendance logs retrieved successfully.",
        logs,
    )))
}
