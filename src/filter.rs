//! Action-filter policy
//!
//! Decides, per workflow, which actions can be seen and staged. A requester
//! never sees the delegation actions (by default `auth` and `allocate`), so a
//! request can't ask for rights that themselves grant further rights.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::subject::{Action, Permission, SubjectType};

/// Which editing flow a session runs. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    /// Direct grant management by an administrator
    Manage,
    /// Request for approval by a prospective grantee
    Request,
}

/// Whether `action` is hidden from editing and submission in `workflow`
pub fn is_hidden(workflow: Workflow, action: &Action, config: &EngineConfig) -> bool {
    match workflow {
        Workflow::Manage => false,
        Workflow::Request => config.request_excluded_actions.contains(action),
    }
}

/// The subset of `all` a user of `workflow` may see and stage, order preserved
pub fn visible_actions(workflow: Workflow, all: &[Action], config: &EngineConfig) -> Vec<Action> {
    all.iter()
        .filter(|a| !is_hidden(workflow, a, config))
        .cloned()
        .collect()
}

/// The workflow's primary action, used as the default grant for non-app subjects
pub fn primary_action(workflow: Workflow, config: &EngineConfig) -> &Action {
    match workflow {
        Workflow::Manage => &config.manage_primary_action,
        Workflow::Request => &config.request_primary_action,
    }
}

/// Permissions a freshly added subject starts with
pub fn default_permissions(workflow: Workflow, subject_type: SubjectType, config: &EngineConfig) -> Vec<Permission> {
    let action = match subject_type {
        SubjectType::App => &config.app_default_action,
        SubjectType::User | SubjectType::Department => primary_action(workflow, config),
    };
    vec![Permission::allow(action.clone())]
}
