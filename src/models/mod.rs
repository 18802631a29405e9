//! # Data Models
//!
//! SeaORM entities for every table of the attendance service.

pub mod attendance_log;
pub mod company;
pub mod department;
pub mod device;
pub mod employee;
pub mod holiday;
pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod notice;
pub mod revoked_token;
pub mod schedule;
pub mod shift;
pub mod subscription;
pub mod user;
pub mod user_permission;
pub mod work_hours;

pub use attendance_log::Entity as AttendanceLog;
pub use company::Entity as Company;
pub use department::Entity as Department;
pub use device::Entity as Device;
pub use employee::Entity as Employee;
pub use holiday::Entity as Holiday;
pub use leave_balance::Entity as LeaveBalance;
pub use leave_request::Entity as LeaveRequest;
pub use leave_type::Entity as LeaveType;
pub use notice::Entity as Notice;
pub use revoked_token::Entity as RevokedToken;
pub use schedule::Entity as Schedule;
pub use shift::Entity as Shift;
pub use subscription::Entity as Subscription;
pub use user::Entity as User;
pub use user_permission::Entity as UserPermission;
pub use work_hours::Entity as WorkHours;

use serde::{Deserialize, Serialize};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "attendance".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
