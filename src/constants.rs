//! Action names, backend error codes and policy defaults

// Action names (wire form)
pub const READ: &str = "read";
pub const WRITE: &str = "write";
pub const AUTH: &str = "auth";
pub const ALLOCATE: &str = "allocate";

// Stable backend error codes the engine recovers from
pub const SUBJECT_ID_NOT_EXIST: &str = "SubjectIdNotExist";
pub const OBJECT_ID_NOT_EXIST: &str = "ObjectIdNotExist";
pub const AUDIT_PROCESS_NOT_FOUND: &str = "AuditProcessNotFound";

/// Actions hidden from requesters: they grant further granting rights.
pub const REQUEST_EXCLUDED_ACTIONS: &[&str] = &[AUTH, ALLOCATE];

/// An Origin subject holding this many permissions is frozen in the request workflow.
pub const FORBIDDEN_PERMISSION_THRESHOLD: usize = 2;

// Known action name mappings, in display order
const ACTIONS: &[&str] = &[READ, WRITE, AUTH, ALLOCATE];

/// Names of the built-in actions, in display order
pub fn known_actions() -> &'static [&'static str] {
    ACTIONS
}

