//! Submission payloads
//!
//! Turns a validated change-set into the record each workflow sends:
//! `Manage` replaces the whole direct-grant list, `Request` files one policy
//! per added or modified subject.

use serde::{Deserialize, Serialize};

use crate::diff::{editable, ChangeSet};
use crate::error::{GrantError, Result};
use crate::filter::Workflow;
use crate::remote::ObjectRef;
use crate::store::PolicyState;
use crate::subject::{Action, Effect, Subject, SubjectType, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPolicy {
    pub object_id: String,
    pub object_type: String,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedPolicy {
    pub subject_id: String,
    pub subject_type: SubjectType,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub object_id: String,
    pub policies: Vec<RequestedPolicy>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePolicy {
    pub object_id: String,
    pub object_type: String,
}

impl DeletePolicy {
    pub fn for_object(object: &ObjectRef) -> Self {
        DeletePolicy { object_id: object.object_id.clone(), object_type: object.object_type.clone() }
    }
}

/// Workflow-specific payload for one submit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    Put(PutPolicy),
    Request(AuthorizationRequest),
}

/// Full direct-grant list, sorted by subject id, departments stripped
pub fn put_policy(object: &ObjectRef, working: &[Subject]) -> PutPolicy {
    let mut subjects: Vec<Subject> = editable(working).map(Subject::stripped).collect();
    subjects.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
    PutPolicy { object_id: object.object_id.clone(), object_type: object.object_type.clone(), subjects }
}

/// One policy per added or modified subject. Only `Allow` permissions are requested.
pub fn authorization_request(object: &ObjectRef, change_set: &ChangeSet, reason: &str) -> AuthorizationRequest {
    let policies = change_set
        .added
        .iter()
        .chain(&change_set.modified)
        .map(|s| RequestedPolicy {
            subject_id: s.subject_id.clone(),
            subject_type: s.subject_type,
            actions: s
                .permissions
                .iter()
                .filter(|p| p.effect == Effect::Allow)
                .map(|p| p.action.clone())
                .collect(),
            expires_at: s.expires_at,
        })
        .collect();
    AuthorizationRequest { object_id: object.object_id.clone(), policies, reason: reason.to_string() }
}

/// Validate the working set and build what a submit sends.
///
/// A request with nothing added or modified is refused with
/// [`GrantError::NoChanges`]; a manage submit always carries the full list.
pub fn build(state: &PolicyState, reason: Option<&str>) -> Result<(ChangeSet, Submission)> {
    let change_set = state.change_set()?;
    let submission = match state.workflow() {
        Workflow::Manage => Submission::Put(put_policy(state.object(), state.working())),
        Workflow::Request => {
            if change_set.added.is_empty() && change_set.modified.is_empty() {
                return Err(GrantError::NoChanges);
            }
            Submission::Request(authorization_request(state.object(), &change_set, reason.unwrap_or_default()))
        }
    };
    Ok((change_set, submission))
}
