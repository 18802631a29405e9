//! # Server Configuration
//!
//! This module contains the server setup and configuration for the attendance API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{TokenIssuer, auth_middleware};
use crate::config::AppConfig;
use crate::handlers::{self, attendance_logs, auth, records::resource, users};
use crate::services::{
    AttendanceLogService, CompanyService, DepartmentService, DeviceService, EmployeeService,
    HolidayService, LeaveBalanceService, LeaveRequestService, LeaveTypeService, NoticeService,
    ScheduleService, ShiftService, SubscriptionService, UserService, WorkHoursService,
};
use crate::telemetry::{TRACE_ID_HEADER, trace_middleware};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenIssuer>,
}

/// Routes that require a bearer access token.
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .merge(resource::<SubscriptionService>("/api/subscriptions"))
        .merge(resource::<CompanyService>("/api/companies"))
        .merge(resource::<UserService>("/api/users"))
        .route(
            "/api/users/{id}/permissions",
            get(users::get_permissions).put(users::set_permissions),
        )
        .merge(resource::<DepartmentService>("/api/departments"))
        .merge(resource::<EmployeeService>("/api/employees"))
        .merge(resource::<DeviceService>("/api/devices"))
        .merge(resource::<AttendanceLogService>("/api/attendance-logs"))
        .route(
            "/api/attendance-logs/by-employee/{employee_id}",
            get(attendance_logs::by_employee),
        )
        .merge(resource::<ShiftService>("/api/shifts"))
        .merge(resource::<ScheduleService>("/api/schedules"))
        .merge(resource::<WorkHoursService>("/api/work-hours"))
        .merge(resource::<HolidayService>("/api/holidays"))
        .merge(resource::<LeaveTypeService>("/api/leave-types"))
        .merge(resource::<LeaveBalanceService>("/api/leave-balances"))
        .merge(resource::<LeaveRequestService>("/api/leave-requests"))
        .merge(resource::<NoticeService>("/api/notices"))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([TRACE_ID_HEADER])
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = protected_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .merge(protected)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let tokens = TokenIssuer::from_config(&config).context("Invalid token configuration")?;
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;

    let state = AppState {
        db,
        config: Arc::new(config),
        tokens: Arc::new(tokens),
    };
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
