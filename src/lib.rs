//! grant-reconcile - access-grant reconciliation for grant editing sessions
//!
//! A session loads the persisted grant set of one object, tags each subject
//! by provenance, lets the caller edit a working copy, and submits the
//! minimal change-set, recovering locally from stale-subject conflicts.
//!
//! ```
//! use grant_reconcile::{EngineConfig, PolicySnapshot, PolicyState, ObjectRef, Position, Subject, Workflow};
//!
//! let snapshot = PolicySnapshot {
//!     subjects: vec![Subject::user("u1").allowing(&["read"])],
//!     ..PolicySnapshot::default()
//! };
//! let mut state = PolicyState::new(
//!     ObjectRef::new("table-7", "table"),
//!     Workflow::Manage,
//!     None,
//!     EngineConfig::default(),
//!     snapshot,
//! );
//! state.add(vec![Subject::user("u2")], Position::Prefix).unwrap();
//! assert!(state.has_changed());
//! let cs = state.change_set().unwrap();
//! assert_eq!(cs.added[0].subject_id, "u2");
//! assert!(cs.modified.is_empty());
//! ```

pub mod classify;
pub mod config;
pub mod constants;
pub mod diff;
pub mod error;
pub mod filter;
pub mod remote;
pub mod session;
pub mod store;
pub mod subject;
pub mod submission;

pub use classify::classify;
pub use config::EngineConfig;
pub use diff::{build_change_set, has_changed, ChangeSet};
pub use error::{GrantError, Result};
pub use filter::{default_permissions, visible_actions, Workflow};
pub use remote::{BackendError, ErrorCode, ObjectRef, PolicyBackend, PolicySnapshot};
pub use session::{Session, SessionContext, SessionEvent, SessionState, SubmitOutcome};
pub use store::{Edit, PolicyState, Position};
pub use subject::{Action, Effect, Permission, Provenance, Subject, SubjectPatch, SubjectRef, SubjectType, Timestamp};
pub use submission::{AuthorizationRequest, DeletePolicy, PutPolicy, RequestedPolicy, Submission};
