//! Database seeding functionality
//!
//! This module provides functionality to seed the database with initial data
//! that must exist before the first company signs up.

pub mod subscription;

pub use subscription::seed_subscriptions;
