//! Capability table and the per-request permission gate.
//!
//! A capability is an `(EntityKind, Action)` pair. Its codename
//! (`attendance.view_employee`) is only how grants are stored and displayed.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use thiserror::Error;
use uuid::Uuid;

use super::Caller;

/// Django-style application label owning a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum App {
    Authentication,
    Attendance,
}

impl App {
    pub fn label(self) -> &'static str {
        match self {
            App::Authentication => "authentication",
            App::Attendance => "attendance",
        }
    }
}

/// Every record kind served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Subscription,
    Company,
    User,
    Department,
    Employee,
    Device,
    AttendanceLog,
    Shift,
    Schedule,
    WorkHours,
    Holiday,
    LeaveType,
    LeaveBalance,
    LeaveRequest,
    Notice,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        EntityKind::Subscription,
        EntityKind::Company,
        EntityKind::User,
        EntityKind::Department,
        EntityKind::Employee,
        EntityKind::Device,
        EntityKind::AttendanceLog,
        EntityKind::Shift,
        EntityKind::Schedule,
        EntityKind::WorkHours,
        EntityKind::Holiday,
        EntityKind::LeaveType,
        EntityKind::LeaveBalance,
        EntityKind::LeaveRequest,
        EntityKind::Notice,
    ];

    pub fn app(self) -> App {
        match self {
            EntityKind::Subscription | EntityKind::Company | EntityKind::User => {
                App::Authentication
            }
            _ => App::Attendance,
        }
    }

    /// Lower-case model name used in codenames.
    pub fn model_name(self) -> &'static str {
        match self {
            EntityKind::Subscription => "subscription",
            EntityKind::Company => "company",
            EntityKind::User => "customuser",
            EntityKind::Department => "department",
            EntityKind::Employee => "employee",
            EntityKind::Device => "device",
            EntityKind::AttendanceLog => "attendancelog",
            EntityKind::Shift => "shift",
            EntityKind::Schedule => "schedule",
            EntityKind::WorkHours => "workhours",
            EntityKind::Holiday => "holiday",
            EntityKind::LeaveType => "leavetype",
            EntityKind::LeaveBalance => "leavebalance",
            EntityKind::LeaveRequest => "leaverequest",
            EntityKind::Notice => "notice",
        }
    }

    /// Human-readable name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Subscription => "Subscription",
            EntityKind::Company => "Company",
            EntityKind::User => "User",
            EntityKind::Department => "Department",
            EntityKind::Employee => "Employee",
            EntityKind::Device => "Device",
            EntityKind::AttendanceLog => "Attendance log",
            EntityKind::Shift => "Shift",
            EntityKind::Schedule => "Schedule",
            EntityKind::WorkHours => "Work hours",
            EntityKind::Holiday => "Holiday",
            EntityKind::LeaveType => "Leave type",
            EntityKind::LeaveBalance => "Leave balance",
            EntityKind::LeaveRequest => "Leave request",
            EntityKind::Notice => "Notice",
        }
    }

    /// Subscriptions are the only records that no company owns.
    pub fn is_tenant_scoped(self) -> bool {
        !matches!(self, EntityKind::Subscription)
    }

    fn from_model_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.model_name() == name)
    }
}

/// What a request does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Add,
    Change,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Add, Action::Change, Action::Delete];

    /// Maps an HTTP verb to the action it performs; unknown verbs map to nothing.
    pub fn for_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Some(Action::View),
            Method::POST => Some(Action::Add),
            Method::PUT | Method::PATCH => Some(Action::Change),
            Method::DELETE => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    pub kind: EntityKind,
    pub action: Action,
}

impl Capability {
    pub fn new(kind: EntityKind, action: Action) -> Self {
        Self { kind, action }
    }

    /// `<app>.<action>_<model>`
    pub fn codename(&self) -> String {
        format!(
            "{}.{}_{}",
            self.kind.app().label(),
            self.action.as_str(),
            self.kind.model_name()
        )
    }

    /// Every capability known to the service.
    pub fn all() -> impl Iterator<Item = Capability> {
        EntityKind::ALL.into_iter().flat_map(|kind| {
            Action::ALL
                .into_iter()
                .map(move |action| Capability::new(kind, action))
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.codename())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability codename '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCapability(s.to_string());
        let (app, rest) = s.split_once('.').ok_or_else(unknown)?;
        let (action, model) = rest.split_once('_').ok_or_else(unknown)?;
        let action = Action::parse(action).ok_or_else(unknown)?;
        let kind = EntityKind::from_model_name(model).ok_or_else(unknown)?;
        if kind.app().label() != app {
            return Err(unknown());
        }
        Ok(Capability::new(kind, action))
    }
}

/// The grants held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    global: HashSet<Capability>,
    per_object: HashSet<(Capability, Uuid)>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, capability: Capability) {
        self.global.insert(capability);
    }

    pub fn grant_object(&mut self, capability: Capability, object_id: Uuid) {
        self.per_object.insert((capability, object_id));
    }

    /// Builds a set from stored `(codename, object_id)` rows, skipping unknown codenames.
    pub fn from_grants<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<Uuid>)>,
    {
        let mut set = Self::new();
        for (codename, object_id) in rows {
            match (codename.parse::<Capability>(), object_id) {
                (Ok(capability), None) => set.grant(capability),
                (Ok(capability), Some(id)) => set.grant_object(capability, id),
                (Err(err), _) => tracing::warn!(error = %err, "Ignoring stored grant"),
            }
        }
        set
    }

    /// A collection needs a global grant; an object accepts either.
    pub fn allows(&self, capability: Capability, object_id: Option<Uuid>) -> bool {
        self.global.contains(&capability)
            || object_id.is_some_and(|id| self.per_object.contains(&(capability, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_object.is_empty()
    }

    /// Sorted codenames of the global grants.
    pub fn codenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.global.iter().map(Capability::codename).collect();
        names.sort();
        names
    }
}

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Method \"{0}\" not allowed.")]
    UnsupportedMethod(Method),
    #[error("You do not have permission to perform this action.")]
    MissingCapability(Capability),
}

/// Checks that `caller` may perform `method` on `kind`.
///
/// `object_id` is set for object routes and lets a per-object grant satisfy
/// the check.
pub fn authorize(
    caller: &Caller,
    kind: EntityKind,
    method: &Method,
    object_id: Option<Uuid>,
) -> Result<Action, Denial> {
    let Some(action) = Action::for_method(method) else {
        return Err(Denial::UnsupportedMethod(method.clone()));
    };

    if caller.is_superuser {
        return Ok(action);
    }

    let capability = Capability::new(kind, action);
    if caller.capabilities.allows(capability, object_id) {
        return Ok(action);
    }

    let codename = capability.codename();
    metrics::counter!("permission_denied_total", "capability" => codename.clone()).increment(1);
    tracing::info!(
        user_id = %caller.user_id,
        capability = %codename,
        object_id = ?object_id,
        "Permission denied"
    );

    Err(Denial::MissingCapability(capability))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(capabilities: CapabilitySet) -> Caller {
        Caller {
            capabilities,
            ..Caller::test_member(Uuid::new_v4())
        }
    }

    #[test]
    fn test_method_to_action() {
        assert_eq!(Action::for_method(&Method::GET), Some(Action::View));
        assert_eq!(Action::for_method(&Method::HEAD), Some(Action::View));
        assert_eq!(Action::for_method(&Method::OPTIONS), Some(Action::View));
        assert_eq!(Action::for_method(&Method::POST), Some(Action::Add));
        assert_eq!(Action::for_method(&Method::PUT), Some(Action::Change));
        assert_eq!(Action::for_method(&Method::PATCH), Some(Action::Change));
        assert_eq!(Action::for_method(&Method::DELETE), Some(Action::Delete));
        assert_eq!(Action::for_method(&Method::TRACE), None);
    }

    #[test]
    fn test_codenames() {
        assert_eq!(
            Capability::new(EntityKind::Employee, Action::View).codename(),
            "attendance.view_employee"
        );
        assert_eq!(
            Capability::new(EntityKind::User, Action::Change).codename(),
            "authentication.change_customuser"
        );
        assert_eq!(
            Capability::new(EntityKind::AttendanceLog, Action::Add).codename(),
            "attendance.add_attendancelog"
        );
        assert_eq!(
            Capability::new(EntityKind::WorkHours, Action::Delete).codename(),
            "attendance.delete_workhours"
        );
        assert_eq!(
            Capability::new(EntityKind::Company, Action::View).codename(),
            "authentication.view_company"
        );
    }

    #[test]
    fn test_codename_parse_matches_display() {
        for capability in Capability::all() {
            let parsed: Capability = capability.codename().parse().unwrap();
            assert_eq!(parsed, capability);
        }
        assert_eq!(Capability::all().count(), 60);
    }

    #[test]
    fn test_codename_parse_rejects_wrong_app() {
        assert!("authentication.view_employee".parse::<Capability>().is_err());
        assert!("attendance.view_customuser".parse::<Capability>().is_err());
        assert!("attendance.fly_employee".parse::<Capability>().is_err());
        assert!("garbage".parse::<Capability>().is_err());
    }

    #[test]
    fn test_superuser_passes_every_gate() {
        let caller = Caller {
            is_superuser: true,
            ..Caller::test_member(Uuid::new_v4())
        };
        for kind in EntityKind::ALL {
            assert!(authorize(&caller, kind, &Method::DELETE, None).is_ok());
        }
    }

    #[test]
    fn test_unknown_method_is_denied_even_for_superuser() {
        let caller = Caller {
            is_superuser: true,
            ..Caller::test_member(Uuid::new_v4())
        };
        assert!(matches!(
            authorize(&caller, EntityKind::Device, &Method::TRACE, None),
            Err(Denial::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_global_grant_allows_collection_and_object() {
        let mut caps = CapabilitySet::new();
        caps.grant(Capability::new(EntityKind::Device, Action::View));
        let caller = staff(caps);

        assert_eq!(
            authorize(&caller, EntityKind::Device, &Method::GET, None),
            Ok(Action::View)
        );
        assert!(authorize(&caller, EntityKind::Device, &Method::GET, Some(Uuid::new_v4())).is_ok());
        assert!(authorize(&caller, EntityKind::Device, &Method::POST, None).is_err());
        assert!(authorize(&caller, EntityKind::Employee, &Method::GET, None).is_err());
    }

    #[test]
    fn test_object_grant_only_covers_that_object() {
        let device = Uuid::new_v4();
        let mut caps = CapabilitySet::new();
        caps.grant_object(Capability::new(EntityKind::Device, Action::Change), device);
        let caller = staff(caps);

        assert!(authorize(&caller, EntityKind::Device, &Method::PATCH, Some(device)).is_ok());
        assert!(
            authorize(&caller, EntityKind::Device, &Method::PATCH, Some(Uuid::new_v4())).is_err()
        );
        assert!(authorize(&caller, EntityKind::Device, &Method::PATCH, None).is_err());
    }

    #[test]
    fn test_from_grants_skips_unknown_rows() {
        let object = Uuid::new_v4();
        let set = CapabilitySet::from_grants([
            ("attendance.view_shift", None),
            ("attendance.change_shift", Some(object)),
            ("attendance.teleport_shift", None),
        ]);

        assert!(set.allows(Capability::new(EntityKind::Shift, Action::View), None));
        assert!(set.allows(
            Capability::new(EntityKind::Shift, Action::Change),
            Some(object)
        ));
        assert_eq!(set.codenames(), vec!["attendance.view_shift".to_string()]);
    }
}
