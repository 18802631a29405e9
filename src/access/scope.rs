//! Tenant scoping policy.
//!
//! One value, derived from the caller, answers both "which rows may be
//! listed" and "may this single row be touched".

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use uuid::Uuid;

/// Records that belong to a company.
pub trait TenantOwned {
    /// Owning company; `None` for records no company owns.
    fn owner(&self) -> Option<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// Superusers see every company.
    Unrestricted,
    /// Rows of exactly this company.
    Company(Uuid),
    /// A caller without a company sees nothing.
    Empty,
}

impl TenantScope {
    pub fn permits(self, owner: Option<Uuid>) -> bool {
        match self {
            TenantScope::Unrestricted => true,
            TenantScope::Company(company) => owner == Some(company),
            TenantScope::Empty => false,
        }
    }

    /// Narrows `select` to the scope; `None` means the result is empty.
    pub fn restrict<E>(self, select: Select<E>, company_column: E::Column) -> Option<Select<E>>
    where
        E: EntityTrait,
    {
        match self {
            TenantScope::Unrestricted => Some(select),
            TenantScope::Company(company) => Some(select.filter(company_column.eq(company))),
            TenantScope::Empty => None,
        }
    }

    /// In-memory counterpart of [`restrict`](Self::restrict).
    pub fn filter_records<T: TenantOwned>(self, records: Vec<T>) -> Vec<T> {
        records
            .into_iter()
            .filter(|record| self.permits(record.owner()))
            .collect()
    }
}
