//! Backend collaborator contract
//!
//! The engine never talks to a transport. Callers implement [`PolicyBackend`]
//! over whatever client they use; every record here is plain serde data.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{AUDIT_PROCESS_NOT_FOUND, OBJECT_ID_NOT_EXIST, SUBJECT_ID_NOT_EXIST};
use crate::submission::{AuthorizationRequest, DeletePolicy, PutPolicy};
use crate::subject::{Subject, SubjectRef};

/// The object whose grants a session edits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_id: String,
    pub object_type: String,
}

impl ObjectRef {
    pub fn new(object_id: impl Into<String>, object_type: impl Into<String>) -> Self {
        ObjectRef { object_id: object_id.into(), object_type: object_type.into() }
    }
}

/// Persisted grant set as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySnapshot {
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    /// Direct grants
    pub subjects: Vec<Subject>,
    /// Grants inherited from a broader scope
    pub subjects_extend: Vec<Subject>,
}

// ============================================================================
// Errors
// ============================================================================

/// Backend error code. The three named codes drive conflict recovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    SubjectIdNotExist,
    ObjectIdNotExist,
    AuditProcessNotFound,
    Other(String),
}

impl ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            SUBJECT_ID_NOT_EXIST => ErrorCode::SubjectIdNotExist,
            OBJECT_ID_NOT_EXIST => ErrorCode::ObjectIdNotExist,
            AUDIT_PROCESS_NOT_FOUND => ErrorCode::AuditProcessNotFound,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::SubjectIdNotExist => SUBJECT_ID_NOT_EXIST,
            ErrorCode::ObjectIdNotExist => OBJECT_ID_NOT_EXIST,
            ErrorCode::AuditProcessNotFound => AUDIT_PROCESS_NOT_FOUND,
            ErrorCode::Other(s) => s,
        }
    }
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        ErrorCode::parse(&s)
    }
}

impl From<ErrorCode> for String {
    fn from(c: ErrorCode) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
    /// Stale subject ids, carried by `SubjectIdNotExist`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_ids: Vec<String>,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError { code: ErrorCode::parse(&code.into()), message: message.into(), subject_ids: Vec::new() }
    }

    pub fn subject_not_found(subject_ids: Vec<String>) -> Self {
        BackendError {
            code: ErrorCode::SubjectIdNotExist,
            message: format!("subjects do not exist: {}", subject_ids.join(", ")),
            subject_ids,
        }
    }

    pub fn object_not_found(object_id: &str) -> Self {
        Self::new(OBJECT_ID_NOT_EXIST, format!("object {} does not exist", object_id))
    }

    pub fn audit_process_not_found() -> Self {
        Self::new(AUDIT_PROCESS_NOT_FOUND, "no approval process is configured")
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Remote collaborator the session loads from and submits to.
///
/// Calls are synchronous from the engine's point of view and carry no
/// retry or timeout policy of their own.
pub trait PolicyBackend {
    fn get_policy(&self, object: &ObjectRef) -> Result<PolicySnapshot, BackendError>;

    /// Replace the full direct-grant list
    fn put_policy(&self, req: &PutPolicy) -> Result<(), BackendError>;

    fn post_authorization_request(&self, req: &AuthorizationRequest) -> Result<(), BackendError>;

    /// Clear all direct grants
    fn delete_policy(&self, req: &DeletePolicy) -> Result<(), BackendError>;

    /// Directory lookup of display attributes for freshly picked subjects
    fn resolve_subjects(&self, refs: &[SubjectRef]) -> Result<Vec<Subject>, BackendError>;
}

impl<B: PolicyBackend + ?Sized> PolicyBackend for &B {
    fn get_policy(&self, object: &ObjectRef) -> Result<PolicySnapshot, BackendError> {
        (**self).get_policy(object)
    }
    fn put_policy(&self, req: &PutPolicy) -> Result<(), BackendError> {
        (**self).put_policy(req)
    }
    fn post_authorization_request(&self, req: &AuthorizationRequest) -> Result<(), BackendError> {
        (**self).post_authorization_request(req)
    }
    fn delete_policy(&self, req: &DeletePolicy) -> Result<(), BackendError> {
        (**self).delete_policy(req)
    }
    fn resolve_subjects(&self, refs: &[SubjectRef]) -> Result<Vec<Subject>, BackendError> {
        (**self).resolve_subjects(refs)
    }
}
