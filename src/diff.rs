//! Diff engine
//!
//! Compares the working set against the frozen snapshot and produces the
//! change-set a submit carries. Both comparisons sort explicitly by subject
//! id first; the order the classifier or the store produced never matters.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::classify::origin_tag;
use crate::config::EngineConfig;
use crate::error::{GrantError, Result};
use crate::filter::{is_hidden, Workflow};
use crate::subject::{normalize_permissions, same_permissions, Effect, Permission, Provenance, Subject, SubjectType, Timestamp};

/// What a submit has to carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Subjects staged in this session
    pub added: Vec<Subject>,
    /// Snapshot subjects whose permissions or expiry changed
    pub modified: Vec<Subject>,
    /// Snapshot subject ids no longer in the working set
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

// Diff-relevant view of a subject: display name, departments and provenance dropped
#[derive(Debug, PartialEq)]
struct GrantView<'a> {
    subject_id: &'a str,
    subject_type: SubjectType,
    permissions: Vec<Permission>,
    expires_at: Option<Timestamp>,
}

fn normalized<'a>(subjects: impl Iterator<Item = &'a Subject>) -> Vec<GrantView<'a>> {
    let mut v: Vec<GrantView<'a>> = subjects
        .map(|s| GrantView {
            subject_id: &s.subject_id,
            subject_type: s.subject_type,
            permissions: normalize_permissions(&s.permissions),
            expires_at: s.expires_at,
        })
        .collect();
    v.sort_by(|a, b| a.subject_id.cmp(b.subject_id));
    v
}

/// Working entries that are direct grants (no inherited or owner rows)
pub fn editable(working: &[Subject]) -> impl Iterator<Item = &Subject> {
    working.iter().filter(|s| s.provenance.is_direct())
}

/// Whether the working set's direct grants differ from the frozen snapshot.
pub fn has_changed(frozen: &[Subject], working: &[Subject]) -> bool {
    normalized(frozen.iter()) != normalized(editable(working))
}

fn grant_differs(frozen: &Subject, emitted: &Subject) -> bool {
    !same_permissions(&frozen.permissions, &emitted.permissions) || frozen.expires_at != emitted.expires_at
}

// Backend-ready copy. In a request, hidden actions can't be staged, and the
// ones the snapshot already holds are carried over so they are not revoked.
fn prepare(workflow: Workflow, s: &Subject, frozen: Option<&Subject>, config: &EngineConfig) -> Subject {
    let mut out = s.stripped();
    if workflow == Workflow::Request {
        out.permissions.retain(|p| !is_hidden(workflow, &p.action, config));
        if let Some(f) = frozen {
            for p in &f.permissions {
                if is_hidden(workflow, &p.action, config) && !out.holds(&p.action) {
                    out.permissions.push(p.clone());
                }
            }
        }
    }
    out
}

/// Minimal change-set for a submit.
///
/// Fails with [`GrantError::MissingPermissions`] if any added subject ends
/// up with no permissions (no `Allow` permissions in a request); nothing is
/// sent in that case.
pub fn build_change_set(
    workflow: Workflow,
    frozen: &[Subject],
    working: &[Subject],
    config: &EngineConfig,
) -> Result<ChangeSet> {
    let by_id: HashMap<&str, &Subject> = frozen.iter().map(|s| (s.subject_id.as_str(), s)).collect();
    let mut cs = ChangeSet::default();

    for s in editable(working) {
        if s.provenance == Provenance::Forbidden {
            continue;
        }
        match by_id.get(s.subject_id.as_str()).copied() {
            Some(f) => {
                // Removed and re-staged under the same id: still a snapshot subject
                if origin_tag(workflow, f, config) == Provenance::Forbidden {
                    continue;
                }
                let emitted = prepare(workflow, s, Some(f), config);
                if grant_differs(f, &emitted) {
                    cs.modified.push(emitted);
                }
            }
            None if s.provenance == Provenance::Origin => cs.modified.push(prepare(workflow, s, None, config)),
            None => cs.added.push(prepare(workflow, s, None, config)),
        }
    }

    // A request only carries `Allow` actions, so a deny-only subject has nothing to ask for
    let missing: Vec<String> = cs
        .added
        .iter()
        .filter(|s| match workflow {
            Workflow::Manage => s.permissions.is_empty(),
            Workflow::Request => !s.permissions.iter().any(|p| p.effect == Effect::Allow),
        })
        .map(|s| s.subject_id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(GrantError::MissingPermissions(missing));
    }

    let present: HashSet<&str> = editable(working).map(|s| s.subject_id.as_str()).collect();
    cs.removed = frozen
        .iter()
        .filter(|f| !present.contains(f.subject_id.as_str()))
        .map(|f| f.subject_id.clone())
        .collect();
    Ok(cs)
}
