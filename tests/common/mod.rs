//! Shared fixtures: an in-memory backend and snapshot builders
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use grant_reconcile::{
    AuthorizationRequest, BackendError, DeletePolicy, EngineConfig, ObjectRef, PolicyBackend, PolicySnapshot,
    PolicyState, PutPolicy, Session, SessionContext, Subject, SubjectRef, Workflow,
};

/// Backend that keeps the persisted snapshot in memory and records every call.
#[derive(Default)]
pub struct MockBackend {
    pub snapshot: RefCell<PolicySnapshot>,
    pub puts: RefCell<Vec<PutPolicy>>,
    pub requests: RefCell<Vec<AuthorizationRequest>>,
    pub deletes: RefCell<Vec<DeletePolicy>>,
    pub directory: RefCell<HashMap<String, Subject>>,
    /// Returned by the next put/post/delete instead of succeeding
    pub fail_next_submit: RefCell<Option<BackendError>>,
    /// Returned by the next get_policy
    pub fail_next_get: RefCell<Option<BackendError>>,
    pub get_calls: Cell<usize>,
}

impl MockBackend {
    pub fn with_snapshot(snapshot: PolicySnapshot) -> Self {
        MockBackend { snapshot: RefCell::new(snapshot), ..Default::default() }
    }

    pub fn fail_submit(&self, e: BackendError) {
        *self.fail_next_submit.borrow_mut() = Some(e);
    }

    pub fn fail_get(&self, e: BackendError) {
        *self.fail_next_get.borrow_mut() = Some(e);
    }

    pub fn register(&self, subject: Subject) {
        self.directory.borrow_mut().insert(subject.subject_id.clone(), subject);
    }

    pub fn submit_calls(&self) -> usize {
        self.puts.borrow().len() + self.requests.borrow().len() + self.deletes.borrow().len()
    }

    fn take_failure(&self) -> Result<(), BackendError> {
        match self.fail_next_submit.borrow_mut().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl PolicyBackend for MockBackend {
    fn get_policy(&self, _object: &ObjectRef) -> Result<PolicySnapshot, BackendError> {
        self.get_calls.set(self.get_calls.get() + 1);
        if let Some(e) = self.fail_next_get.borrow_mut().take() {
            return Err(e);
        }
        Ok(self.snapshot.borrow().clone())
    }

    fn put_policy(&self, req: &PutPolicy) -> Result<(), BackendError> {
        self.take_failure()?;
        self.puts.borrow_mut().push(req.clone());
        self.snapshot.borrow_mut().subjects = req.subjects.clone();
        Ok(())
    }

    fn post_authorization_request(&self, req: &AuthorizationRequest) -> Result<(), BackendError> {
        self.take_failure()?;
        self.requests.borrow_mut().push(req.clone());
        Ok(())
    }

    fn delete_policy(&self, req: &DeletePolicy) -> Result<(), BackendError> {
        self.take_failure()?;
        self.deletes.borrow_mut().push(req.clone());
        self.snapshot.borrow_mut().subjects.clear();
        Ok(())
    }

    fn resolve_subjects(&self, refs: &[SubjectRef]) -> Result<Vec<Subject>, BackendError> {
        let dir = self.directory.borrow();
        refs.iter()
            .map(|r| {
                dir.get(&r.subject_id)
                    .cloned()
                    .ok_or_else(|| BackendError::new("DirectoryLookupFailed", format!("unknown subject {}", r.subject_id)))
            })
            .collect()
    }
}

pub fn object() -> ObjectRef {
    ObjectRef::new("tbl-42", "table")
}

/// `frozen = [u1: read]`
pub fn snapshot_u1() -> PolicySnapshot {
    PolicySnapshot {
        subjects: vec![Subject::user("u1").with_name("Alice").allowing(&["read"])],
        ..PolicySnapshot::default()
    }
}

pub fn state(workflow: Workflow, snapshot: PolicySnapshot) -> PolicyState {
    PolicyState::new(object(), workflow, None, EngineConfig::default(), snapshot)
}

pub fn ctx(workflow: Workflow) -> SessionContext {
    SessionContext { object: object(), workflow, current_subject_id: None }
}

pub fn open(backend: &MockBackend, workflow: Workflow) -> Session<&MockBackend> {
    Session::open(backend, ctx(workflow), EngineConfig::default()).unwrap()
}

pub fn ids(subjects: &[Subject]) -> Vec<&str> {
    subjects.iter().map(|s| s.subject_id.as_str()).collect()
}
