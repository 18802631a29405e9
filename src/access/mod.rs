//! # Access Control
//!
//! The authenticated caller, the tenant scope derived from it and the
//! capability gate every record route goes through.

pub mod permission;
pub mod scope;

pub use permission::{Action, App, Capability, CapabilitySet, Denial, EntityKind, authorize};
pub use scope::{TenantOwned, TenantScope};

use uuid::Uuid;

use crate::models::user::Role;
use crate::services::ServiceError;
use crate::validation::ValidationErrors;

/// Message returned to members of a deactivated company.
pub const INACTIVE_COMPANY_MESSAGE: &str = "Your company or account is inactive.";

/// Identity of the user behind a request, resolved once by the auth middleware.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: String,
    pub company_id: Option<Uuid>,
    /// Company is active and the user's own company switch is on
    pub company_active: bool,
    pub is_superuser: bool,
    pub role: Option<Role>,
    pub capabilities: CapabilitySet,
}

impl Caller {
    pub fn scope(&self) -> TenantScope {
        if self.is_superuser {
            TenantScope::Unrestricted
        } else {
            match self.company_id {
                Some(company) => TenantScope::Company(company),
                None => TenantScope::Empty,
            }
        }
    }

    /// Rejects members of an inactive company. Superusers and users without a
    /// company are not affected.
    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.is_superuser || self.company_id.is_none() || self.company_active {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                INACTIVE_COMPANY_MESSAGE.to_string(),
            ))
        }
    }

    /// Resolves the owning company of a new record.
    ///
    /// Members always write into their own company; superusers must name one.
    pub fn company_for_create(&self, requested: Option<Uuid>) -> Result<Uuid, ServiceError> {
        if self.is_superuser {
            return requested.ok_or_else(|| {
                ValidationErrors::single("company_id", "This field is required.").into()
            });
        }

        let Some(own) = self.company_id else {
            return Err(ServiceError::PermissionDenied(
                "You are not associated with any company.".to_string(),
            ));
        };

        match requested {
            Some(other) if other != own => Err(ServiceError::PermissionDenied(
                "You cannot manage records of another company.".to_string(),
            )),
            _ => Ok(own),
        }
    }

    /// Resolves the owning company of an updated record. Only superusers may
    /// move a record to another company.
    pub fn company_for_update(
        &self,
        current: Uuid,
        requested: Option<Uuid>,
    ) -> Result<Uuid, ServiceError> {
        match requested {
            None => Ok(current),
            Some(company) if company == current => Ok(current),
            Some(company) if self.is_superuser => Ok(company),
            Some(_) => Err(ServiceError::PermissionDenied(
                "You cannot manage records of another company.".to_string(),
            )),
        }
    }

    #[cfg(test)]
    pub(crate) fn test_member(company_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: "member@example.com".to_string(),
            company_id: Some(company_id),
            company_active: true,
            is_superuser: false,
            role: None,
            capabilities: CapabilitySet::new(),
        }
    }
}
