//! Subject model: grantees, their permissions and provenance tags

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{known_actions, ALLOCATE, AUTH, READ, WRITE};

/// Epoch milliseconds
pub type Timestamp = u64;

// ============================================================================
// Actions & Permissions
// ============================================================================

/// A permission action. Open-ended: unknown names are kept as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Read,
    Write,
    Auth,
    Allocate,
    Custom(String),
}

impl Action {
    /// Parse an action name. Names are case-insensitive and custom ones are
    /// stored lowercased.
    pub fn new(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            READ => Action::Read,
            WRITE => Action::Write,
            AUTH => Action::Auth,
            ALLOCATE => Action::Allocate,
            _ => Action::Custom(name),
        }
    }

    fn is_custom(&self) -> bool {
        matches!(self, Action::Custom(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Read => READ,
            Action::Write => WRITE,
            Action::Auth => AUTH,
            Action::Allocate => ALLOCATE,
            Action::Custom(s) => s,
        }
    }

    /// The built-in actions in display order
    pub fn known() -> Vec<Action> {
        known_actions().iter().map(|n| Action::new(n)).collect()
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::new(&s)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::new(s)
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        match a {
            Action::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> Ordering {
        // A hand-built `Custom("read")` is distinct from `Read`; sort it after
        self.as_str()
            .cmp(other.as_str())
            .then_with(|| self.is_custom().cmp(&other.is_custom()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    #[serde(default)]
    pub effect: Effect,
}

impl Permission {
    pub fn allow(action: impl Into<Action>) -> Self {
        Permission { action: action.into(), effect: Effect::Allow }
    }

    pub fn deny(action: impl Into<Action>) -> Self {
        Permission { action: action.into(), effect: Effect::Deny }
    }
}

/// Order-insensitive copy of a permission list: sorted by action, then effect.
pub fn normalize_permissions(perms: &[Permission]) -> Vec<Permission> {
    let mut v = perms.to_vec();
    v.sort();
    v
}

/// Same length and same membership, position ignored
pub fn same_permissions(a: &[Permission], b: &[Permission]) -> bool {
    a.len() == b.len() && normalize_permissions(a) == normalize_permissions(b)
}

// ============================================================================
// Subjects
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    #[default]
    User,
    App,
    Department,
}

/// How an entry entered the working set. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Staged in this session
    #[default]
    New,
    /// Present in the frozen snapshot
    Origin,
    /// Origin entry locked for the request workflow
    Forbidden,
    /// Inherited from a broader grant
    Extend,
    /// Synthetic owner row, informational only
    Owner,
}

impl Provenance {
    /// Origin, including the Forbidden refinement
    pub fn is_origin(self) -> bool {
        matches!(self, Provenance::Origin | Provenance::Forbidden)
    }

    /// Whether the entry is a direct grant that takes part in diffing
    pub fn is_direct(self) -> bool {
        !matches!(self, Provenance::Extend | Provenance::Owner)
    }
}

/// A grantee and its permission set on the session's object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_id: String,
    #[serde(default)]
    pub subject_type: SubjectType,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(skip)]
    pub provenance: Provenance,
}

impl Subject {
    pub fn new(subject_id: impl Into<String>, subject_type: SubjectType) -> Self {
        Subject {
            subject_id: subject_id.into(),
            subject_type,
            display_name: String::new(),
            departments: None,
            permissions: Vec::new(),
            expires_at: None,
            provenance: Provenance::New,
        }
    }

    pub fn user(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, SubjectType::User)
    }

    pub fn app(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, SubjectType::App)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Shorthand for a list of `Allow` permissions
    pub fn allowing(self, actions: &[&str]) -> Self {
        self.with_permissions(actions.iter().map(|a| Permission::allow(*a)).collect())
    }

    pub fn with_expiry(mut self, expires_at: Option<Timestamp>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_departments(mut self, departments: Vec<String>) -> Self {
        self.departments = Some(departments);
        self
    }

    pub fn tagged(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.permissions.iter().map(|p| p.action.clone()).collect()
    }

    pub fn holds(&self, action: &Action) -> bool {
        self.permissions.iter().any(|p| &p.action == action)
    }

    /// Copy fit for the backend: department metadata dropped, provenance reset.
    pub fn stripped(&self) -> Subject {
        Subject {
            departments: None,
            provenance: Provenance::New,
            ..self.clone()
        }
    }
}

/// Identity of a subject picked for staging, before directory resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub subject_id: String,
    #[serde(default)]
    pub subject_type: SubjectType,
}

/// Partial update merged into an existing working-set entry.
///
/// `expires_at: Some(None)` clears the expiry; `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPatch {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<Timestamp>>,
}

impl SubjectPatch {
    pub fn new(subject_id: impl Into<String>) -> Self {
        SubjectPatch { subject_id: subject_id.into(), ..Default::default() }
    }

    pub fn permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn expires_at(mut self, expires_at: Option<Timestamp>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub(crate) fn merge_into(&self, s: &mut Subject) {
        if let Some(name) = &self.display_name {
            s.display_name = name.clone();
        }
        if let Some(depts) = &self.departments {
            s.departments = Some(depts.clone());
        }
        if let Some(perms) = &self.permissions {
            s.permissions = perms.clone();
        }
        if let Some(exp) = self.expires_at {
            s.expires_at = exp;
        }
    }
}

// Distinguishes a missing field (None) from an explicit null (Some(None))
fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
