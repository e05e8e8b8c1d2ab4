//! Editing session: state machine, submission and conflict recovery
//!
//! A session owns one [`PolicyState`] for one object and one workflow. It
//! recomputes the change flag after every edit and tells subscribers when
//! the flag flips, so a host can enable its save button or prompt before
//! navigating away without any shared global state.
//!
//! States:
//!
//! ```text
//! Loading -> Ready <-> Editing -> Submitting -> Ready     (success, rebased)
//!                                            -> Editing   (recoverable conflict / generic error)
//!                                            -> Closed    (object gone, no approval process)
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::diff::ChangeSet;
use crate::error::{GrantError, Result};
use crate::filter::{self, Workflow};
use crate::remote::{BackendError, ErrorCode, ObjectRef, PolicyBackend, PolicySnapshot};
use crate::store::{Edit, PolicyState, Position};
use crate::submission::{self, DeletePolicy, Submission};
use crate::subject::{Action, Permission, Subject, SubjectPatch, SubjectRef, SubjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    Editing,
    Submitting,
    Closed,
}

/// Notification pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The working set started or stopped differing from the snapshot
    Changed(bool),
    /// Submit hit subjects the backend no longer knows; their names were cleared
    StaleSubjects(Vec<String>),
    /// Session torn down. `refresh` asks the host to reload its outer list.
    Closed { refresh: bool },
}

/// Result of a submit that reached the backend
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Persisted; the session rebased on the new snapshot
    Submitted(ChangeSet),
    /// Listed subjects are stale; edit and resubmit
    StaleSubjects(Vec<String>),
    /// The object was deleted concurrently; session closed
    ObjectRemoved,
    /// No approval process is configured for requests; session closed
    ApprovalProcessMissing,
}

/// Who edits what, and how
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub object: ObjectRef,
    pub workflow: Workflow,
    /// The acting user
    pub current_subject_id: Option<String>,
}

pub struct Session<B: PolicyBackend> {
    backend: B,
    state: SessionState,
    policy: PolicyState,
    changed: bool,
    listeners: Vec<Sender<SessionEvent>>,
}

impl<B: PolicyBackend> Session<B> {
    /// A session in `Loading`; call [`Session::load`] before editing.
    pub fn new(backend: B, ctx: SessionContext, config: EngineConfig) -> Self {
        let policy = PolicyState::new(ctx.object, ctx.workflow, ctx.current_subject_id, config, PolicySnapshot::default());
        Session { backend, state: SessionState::Loading, policy, changed: false, listeners: Vec::new() }
    }

    /// Create and load in one step
    pub fn open(backend: B, ctx: SessionContext, config: EngineConfig) -> Result<Self> {
        let mut s = Self::new(backend, ctx, config);
        s.load()?;
        Ok(s)
    }

    /// Fetch the snapshot and build the working set.
    ///
    /// An object that no longer exists closes the session; other failures
    /// leave it in `Loading` so the load can be retried.
    pub fn load(&mut self) -> Result<()> {
        if self.state != SessionState::Loading {
            return Err(GrantError::InvalidState(self.state));
        }
        match self.backend.get_policy(self.policy.object()) {
            Ok(snapshot) => {
                info!(
                    object_id = %self.policy.object().object_id,
                    workflow = ?self.policy.workflow(),
                    direct = snapshot.subjects.len(),
                    inherited = snapshot.subjects_extend.len(),
                    "policy loaded"
                );
                self.policy.rebase(snapshot);
                self.state = SessionState::Ready;
                self.changed = false;
                Ok(())
            }
            Err(e) if e.code == ErrorCode::ObjectIdNotExist => {
                warn!(object_id = %self.policy.object().object_id, "object vanished before load");
                self.teardown(false);
                Err(GrantError::Remote(e))
            }
            Err(e) => Err(GrantError::Remote(e)),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    pub fn working(&self) -> &[Subject] {
        self.policy.working()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the direct grants differ from the snapshot.
    ///
    /// In a request this can be true while [`Session::submit`] would still
    /// refuse with `NoChanges` (hidden-action or Forbidden-only edits); use
    /// [`Session::can_submit`] to gate a save action.
    pub fn has_changed(&self) -> bool {
        self.policy.has_changed()
    }

    /// Whether a save action should be offered: the session is editable and
    /// a submit would carry a change or report a validation error.
    ///
    /// A request whose only edits touch hidden actions or Forbidden subjects
    /// yields `false`.
    pub fn can_submit(&self) -> bool {
        if self.ensure_editable().is_err() {
            return false;
        }
        match self.policy.workflow() {
            Workflow::Manage => self.has_changed(),
            Workflow::Request => match self.policy.change_set() {
                Ok(cs) => !cs.added.is_empty() || !cs.modified.is_empty(),
                Err(_) => true,
            },
        }
    }

    /// Whether closing now would drop edits the host should confirm first
    pub fn needs_discard_confirmation(&self) -> bool {
        self.state != SessionState::Closed && self.has_changed()
    }

    pub fn change_set(&self) -> Result<ChangeSet> {
        self.policy.change_set()
    }

    pub fn visible_actions(&self, all: &[Action]) -> Vec<Action> {
        filter::visible_actions(self.policy.workflow(), all, self.policy.config())
    }

    pub fn default_permissions(&self, subject_type: SubjectType) -> Vec<Permission> {
        filter::default_permissions(self.policy.workflow(), subject_type, self.policy.config())
    }

    /// Register for session events. Dropped receivers are pruned on the next send.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    // ========================================================================
    // Edits
    // ========================================================================

    pub fn add(&mut self, subjects: Vec<Subject>, position: Position) -> Result<()> {
        self.edit(|p| p.add(subjects, position))
    }

    /// Resolve picked subjects through the directory, then stage them.
    pub fn add_resolved(&mut self, refs: &[SubjectRef], position: Position) -> Result<()> {
        self.ensure_editable()?;
        let subjects = self.backend.resolve_subjects(refs)?;
        self.add(subjects, position)
    }

    pub fn update(&mut self, subject: Subject) -> Result<bool> {
        self.edit(|p| Ok(p.update(subject)))
    }

    pub fn batch_update(&mut self, patches: &[SubjectPatch]) -> Result<usize> {
        self.edit(|p| Ok(p.batch_update(patches)))
    }

    pub fn remove(&mut self, subject_id: &str) -> Result<bool> {
        self.edit(|p| p.remove(subject_id))
    }

    pub fn reset(&mut self) -> Result<()> {
        self.edit(|p| {
            p.reset_to_origin_or_clear();
            Ok(())
        })
    }

    pub fn apply(&mut self, edit: Edit) -> Result<()> {
        self.edit(|p| p.apply(edit))
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.state {
            SessionState::Ready | SessionState::Editing => Ok(()),
            other => Err(GrantError::InvalidState(other)),
        }
    }

    fn edit<T>(&mut self, f: impl FnOnce(&mut PolicyState) -> Result<T>) -> Result<T> {
        self.ensure_editable()?;
        let r = f(&mut self.policy)?;
        self.refresh_changed();
        debug!(working = self.policy.working().len(), changed = self.changed, "working set edited");
        Ok(r)
    }

    fn refresh_changed(&mut self) {
        let changed = self.policy.has_changed();
        self.state = if changed { SessionState::Editing } else { SessionState::Ready };
        if changed != self.changed {
            self.changed = changed;
            self.emit(SessionEvent::Changed(changed));
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Validate, send and reconcile.
    ///
    /// Validation failures return `Err` before anything is sent. Known
    /// conflicts come back as a [`SubmitOutcome`]; unknown backend errors
    /// return [`GrantError::Remote`] and leave the working set untouched.
    pub fn submit(&mut self, reason: Option<&str>) -> Result<SubmitOutcome> {
        self.ensure_editable()?;
        let (change_set, submission) = submission::build(&self.policy, reason)?;

        self.state = SessionState::Submitting;
        info!(
            object_id = %self.policy.object().object_id,
            added = change_set.added.len(),
            modified = change_set.modified.len(),
            removed = change_set.removed.len(),
            "submitting"
        );
        let sent = match &submission {
            Submission::Put(req) => self.backend.put_policy(req),
            Submission::Request(req) => self.backend.post_authorization_request(req),
        };
        match sent {
            Ok(()) => {
                let fallback = match submission {
                    Submission::Put(req) => PolicySnapshot { subjects: req.subjects, ..self.policy.snapshot().clone() },
                    Submission::Request(_) => self.policy.snapshot().clone(),
                };
                self.rebase_after_submit(fallback);
                Ok(SubmitOutcome::Submitted(change_set))
            }
            Err(e) => self.recover(e),
        }
    }

    /// Clear every direct grant on the object. Manage workflow only; the host
    /// is expected to have confirmed with the user.
    pub fn revoke_all(&mut self) -> Result<SubmitOutcome> {
        if self.policy.workflow() != Workflow::Manage {
            return Err(GrantError::Unsupported("revoke all is only available when managing grants".into()));
        }
        self.ensure_editable()?;

        let change_set = ChangeSet {
            removed: self.policy.frozen().iter().map(|s| s.subject_id.clone()).collect(),
            ..ChangeSet::default()
        };
        self.state = SessionState::Submitting;
        info!(object_id = %self.policy.object().object_id, removed = change_set.removed.len(), "revoking all grants");
        match self.backend.delete_policy(&DeletePolicy::for_object(self.policy.object())) {
            Ok(()) => {
                let fallback = PolicySnapshot { subjects: Vec::new(), ..self.policy.snapshot().clone() };
                self.rebase_after_submit(fallback);
                Ok(SubmitOutcome::Submitted(change_set))
            }
            Err(e) => self.recover(e),
        }
    }

    /// Close without submitting. Edits are dropped; confirm first when
    /// [`Session::needs_discard_confirmation`] says so.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.teardown(false);
        }
    }

    fn rebase_after_submit(&mut self, fallback: PolicySnapshot) {
        let snapshot = match self.backend.get_policy(self.policy.object()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "re-fetch after submit failed, rebasing on submitted state");
                fallback
            }
        };
        self.policy.rebase(snapshot);
        self.refresh_changed();
    }

    fn recover(&mut self, e: BackendError) -> Result<SubmitOutcome> {
        match e.code {
            ErrorCode::SubjectIdNotExist => {
                let patched = self.policy.clear_display_names(&e.subject_ids);
                warn!(stale = ?e.subject_ids, patched, "submit rejected: stale subjects");
                self.state = SessionState::Editing;
                self.emit(SessionEvent::StaleSubjects(e.subject_ids.clone()));
                Ok(SubmitOutcome::StaleSubjects(e.subject_ids))
            }
            ErrorCode::ObjectIdNotExist => {
                warn!(object_id = %self.policy.object().object_id, "submit rejected: object no longer exists");
                self.teardown(false);
                Ok(SubmitOutcome::ObjectRemoved)
            }
            ErrorCode::AuditProcessNotFound if self.policy.workflow() == Workflow::Request => {
                warn!(object_id = %self.policy.object().object_id, "submit rejected: no approval process configured");
                self.teardown(true);
                Ok(SubmitOutcome::ApprovalProcessMissing)
            }
            _ => {
                warn!(error = %e, "submit failed");
                self.state = SessionState::Editing;
                Err(GrantError::Remote(e))
            }
        }
    }

    fn teardown(&mut self, refresh: bool) {
        self.policy.discard();
        self.state = SessionState::Closed;
        self.changed = false;
        self.emit(SessionEvent::Closed { refresh });
    }
}
