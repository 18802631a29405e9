//! # Attendance API Library
//!
//! This library provides the core functionality for the multi-tenant attendance
//! service: tenant scoping, the permission gate, record services, handlers and
//! server configuration.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod seeds;
pub mod server;
pub mod services;
pub mod telemetry;
pub mod validation;
pub use migration;
