//! Working-set store
//!
//! Holds the frozen snapshot a session started from and the working copy the
//! user edits. The snapshot is only ever replaced wholesale (see
//! [`PolicyState::rebase`]); every edit touches `working` alone.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::classify::classify;
use crate::config::EngineConfig;
use crate::diff::{build_change_set, has_changed, ChangeSet};
use crate::error::{GrantError, Result};
use crate::filter::{default_permissions, Workflow};
use crate::remote::{ObjectRef, PolicySnapshot};
use crate::subject::{Provenance, Subject, SubjectPatch};

/// Where newly staged subjects are inserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Prefix,
    Suffix,
}

/// A single working-set edit, in a form that can be scripted or replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    Add {
        subjects: Vec<Subject>,
        #[serde(default)]
        position: Option<Position>,
    },
    Update {
        subject: Subject,
    },
    BatchUpdate {
        patches: Vec<SubjectPatch>,
    },
    Remove {
        #[serde(rename = "subjectId")]
        subject_id: String,
    },
    Reset,
}

#[derive(Debug, Clone)]
pub struct PolicyState {
    object: ObjectRef,
    workflow: Workflow,
    current_subject_id: Option<String>,
    config: EngineConfig,
    snapshot: PolicySnapshot,
    working: Vec<Subject>,
}

impl PolicyState {
    pub fn new(
        object: ObjectRef,
        workflow: Workflow,
        current_subject_id: Option<String>,
        config: EngineConfig,
        snapshot: PolicySnapshot,
    ) -> Self {
        let working = classify(&snapshot, workflow, current_subject_id.as_deref(), &config);
        PolicyState { object, workflow, current_subject_id, config, snapshot, working }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }

    /// Direct grants as last persisted
    pub fn frozen(&self) -> &[Subject] {
        &self.snapshot.subjects
    }

    pub fn inherited(&self) -> &[Subject] {
        &self.snapshot.subjects_extend
    }

    pub fn working(&self) -> &[Subject] {
        &self.working
    }

    /// Entry for `subject_id`, preferring the direct grant when the subject
    /// also has an inherited or owner row.
    pub fn get(&self, subject_id: &str) -> Option<&Subject> {
        self.direct(subject_id)
            .map(|idx| &self.working[idx])
            .or_else(|| self.working.iter().find(|s| s.subject_id == subject_id))
    }

    // Index of the direct row for `subject_id`. Inherited and owner rows may
    // share the id and are never edited.
    fn direct(&self, subject_id: &str) -> Option<usize> {
        self.working
            .iter()
            .position(|s| s.provenance.is_direct() && s.subject_id == subject_id)
    }

    pub fn has_changed(&self) -> bool {
        has_changed(self.frozen(), &self.working)
    }

    pub fn change_set(&self) -> Result<ChangeSet> {
        build_change_set(self.workflow, self.frozen(), &self.working, &self.config)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Stage new subjects. Empty permission lists get the workflow defaults.
    ///
    /// A subject id that already has a direct grant (or is repeated within the
    /// batch) rejects the whole call. Inherited and owner rows don't count.
    pub fn add(&mut self, subjects: Vec<Subject>, position: Position) -> Result<()> {
        let mut seen: HashSet<&str> = self
            .working
            .iter()
            .filter(|s| s.provenance.is_direct())
            .map(|s| s.subject_id.as_str())
            .collect();
        for s in &subjects {
            if !seen.insert(s.subject_id.as_str()) {
                return Err(GrantError::DuplicateSubject(s.subject_id.clone()));
            }
        }

        let staged = subjects.into_iter().map(|mut s| {
            if s.permissions.is_empty() {
                s.permissions = default_permissions(self.workflow, s.subject_type, &self.config);
            }
            s.tagged(Provenance::New)
        });
        match position {
            Position::Prefix => {
                let rest = std::mem::take(&mut self.working);
                self.working = staged.chain(rest).collect();
            }
            Position::Suffix => {
                let staged: Vec<Subject> = staged.collect();
                self.working.extend(staged);
            }
        }
        Ok(())
    }

    /// Replace the direct entry with the same id, keeping its provenance.
    pub fn update(&mut self, subject: Subject) -> bool {
        match self.direct(&subject.subject_id) {
            Some(idx) => {
                let slot = &mut self.working[idx];
                let provenance = slot.provenance;
                *slot = subject.tagged(provenance);
                true
            }
            None => false,
        }
    }

    /// Merge each patch into its entry; patches without a match are skipped.
    pub fn batch_update(&mut self, patches: &[SubjectPatch]) -> usize {
        let mut applied = 0;
        for p in patches {
            if let Some(idx) = self.direct(&p.subject_id) {
                p.merge_into(&mut self.working[idx]);
                applied += 1;
            }
        }
        applied
    }

    /// Drop the direct entry for `subject_id`. A subject with only an
    /// inherited or owner row is refused.
    pub fn remove(&mut self, subject_id: &str) -> Result<bool> {
        if let Some(idx) = self.direct(subject_id) {
            self.working.remove(idx);
            return Ok(true);
        }
        match self.working.iter().find(|s| s.subject_id == subject_id) {
            Some(s) => Err(GrantError::NotRemovable { subject_id: subject_id.to_string(), provenance: s.provenance }),
            None => Ok(false),
        }
    }

    /// Discard this session's edits.
    ///
    /// With only staged entries left the working set is cleared; otherwise it
    /// is rebuilt from the snapshot, Forbidden tags included.
    pub fn reset_to_origin_or_clear(&mut self) {
        let only_staged = self.working.iter().all(|s| s.provenance == Provenance::New);
        if only_staged {
            self.working.clear();
        } else {
            self.working = classify(&self.snapshot, self.workflow, self.current_subject_id.as_deref(), &self.config);
        }
    }

    pub fn apply(&mut self, edit: Edit) -> Result<()> {
        match edit {
            Edit::Add { subjects, position } => {
                let position = position.unwrap_or(self.config.default_position);
                self.add(subjects, position)
            }
            Edit::Update { subject } => {
                self.update(subject);
                Ok(())
            }
            Edit::BatchUpdate { patches } => {
                self.batch_update(&patches);
                Ok(())
            }
            Edit::Remove { subject_id } => self.remove(&subject_id).map(|_| ()),
            Edit::Reset => {
                self.reset_to_origin_or_clear();
                Ok(())
            }
        }
    }

    /// Replace the snapshot and rebuild the working set from it.
    pub fn rebase(&mut self, snapshot: PolicySnapshot) {
        self.snapshot = snapshot;
        self.working = classify(&self.snapshot, self.workflow, self.current_subject_id.as_deref(), &self.config);
    }

    /// Blank the display name of each listed subject; ids and permissions stay.
    pub(crate) fn clear_display_names(&mut self, subject_ids: &[String]) -> usize {
        let stale: HashSet<&str> = subject_ids.iter().map(String::as_str).collect();
        let mut n = 0;
        for s in self
            .working
            .iter_mut()
            .filter(|s| s.provenance.is_direct() && stale.contains(s.subject_id.as_str()))
        {
            s.display_name.clear();
            n += 1;
        }
        n
    }

    pub(crate) fn discard(&mut self) {
        self.working.clear();
    }
}
