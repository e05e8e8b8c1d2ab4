//! Working-set store tests: staging, updates, removal and reset

mod common;

use common::{ids, object, snapshot_u1, state};
use grant_reconcile::{
    Edit, EngineConfig, GrantError, Permission, PolicySnapshot, PolicyState, Position, Provenance, Subject, SubjectPatch,
    Workflow,
};

fn full_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        owner_id: Some("owner".into()),
        owner_name: Some("Olga".into()),
        subjects: vec![
            Subject::user("u1").allowing(&["read"]),
            Subject::user("u2").allowing(&["read", "write"]),
        ],
        subjects_extend: vec![Subject::user("g1").allowing(&["read"])],
    }
}

// ============================================================================
// add
// ============================================================================

#[test]
fn add_respects_position() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    s.add(vec![Subject::user("a"), Subject::user("b")], Position::Prefix).unwrap();
    s.add(vec![Subject::user("z")], Position::Suffix).unwrap();
    assert_eq!(ids(s.working()), vec!["a", "b", "u1", "z"]);
}

#[test]
fn add_fills_defaults_by_subject_type() {
    let cfg = EngineConfig { manage_primary_action: "write".into(), ..EngineConfig::default() };
    let mut s = PolicyState::new(object(), Workflow::Manage, None, cfg, PolicySnapshot::default());
    s.add(
        vec![Subject::user("u"), Subject::app("svc"), Subject::user("x").allowing(&["auth"])],
        Position::Suffix,
    )
    .unwrap();
    assert_eq!(s.get("u").unwrap().permissions, vec![Permission::allow("write")]);
    assert_eq!(s.get("svc").unwrap().permissions, vec![Permission::allow("read")]);
    assert_eq!(s.get("x").unwrap().permissions, vec![Permission::allow("auth")]);
}

#[test]
fn add_rejects_duplicates_without_partial_effect() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    let err = s.add(vec![Subject::user("u2"), Subject::user("u1")], Position::Prefix).unwrap_err();
    assert_eq!(err, GrantError::DuplicateSubject("u1".into()));
    assert_eq!(ids(s.working()), vec!["u1"]);

    let err = s.add(vec![Subject::user("u3"), Subject::user("u3")], Position::Prefix).unwrap_err();
    assert_eq!(err, GrantError::DuplicateSubject("u3".into()));
    assert_eq!(ids(s.working()), vec!["u1"]);
}

#[test]
fn added_subjects_are_tagged_new_whatever_they_carry() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    s.add(vec![Subject::user("u2").tagged(Provenance::Extend)], Position::Prefix).unwrap();
    assert_eq!(s.get("u2").unwrap().provenance, Provenance::New);
}

// ============================================================================
// update / batch_update
// ============================================================================

#[test]
fn update_keeps_provenance_and_ignores_unknown_ids() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    assert!(s.update(Subject::user("u1").allowing(&["write"]).tagged(Provenance::New)));
    assert_eq!(s.get("u1").unwrap().provenance, Provenance::Origin);
    assert!(!s.update(Subject::user("nobody")));
    assert_eq!(s.working().len(), 1);
}

#[test]
fn batch_update_merges_and_skips_silently() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    let applied = s.batch_update(&[
        SubjectPatch::new("u1").expires_at(Some(99)),
        SubjectPatch::new("missing").permissions(vec![Permission::allow("write")]),
    ]);
    assert_eq!(applied, 1);
    let u1 = s.get("u1").unwrap();
    assert_eq!(u1.expires_at, Some(99));
    assert_eq!(u1.display_name, "Alice");
    assert_eq!(u1.permissions, vec![Permission::allow("read")]);
}

// ============================================================================
// remove
// ============================================================================

#[test]
fn remove_refuses_inherited_and_owner_rows() {
    let mut s = state(Workflow::Manage, full_snapshot());
    assert_eq!(
        s.remove("g1"),
        Err(GrantError::NotRemovable { subject_id: "g1".into(), provenance: Provenance::Extend })
    );
    assert!(matches!(s.remove("owner"), Err(GrantError::NotRemovable { .. })));
    assert_eq!(s.remove("nobody"), Ok(false));
    assert_eq!(s.remove("u1"), Ok(true));
    assert_eq!(ids(s.working()), vec!["owner", "g1", "u2"]);
}

#[test]
fn remove_does_not_revalidate_forbidden_entries() {
    let mut s = state(Workflow::Request, full_snapshot());
    assert_eq!(s.get("u2").unwrap().provenance, Provenance::Forbidden);
    assert_eq!(s.remove("u2"), Ok(true));
}

// ============================================================================
// subjects with both an inherited and a direct grant
// ============================================================================

fn shared_id_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        owner_id: Some("u2".into()),
        subjects: vec![
            Subject::user("u1").allowing(&["read"]),
            Subject::user("u2").allowing(&["read"]),
        ],
        subjects_extend: vec![Subject::user("u1").allowing(&["read"])],
        ..PolicySnapshot::default()
    }
}

fn rows<'a>(s: &'a PolicyState, id: &str) -> Vec<(Provenance, &'a [Permission])> {
    s.working()
        .iter()
        .filter(|x| x.subject_id == id)
        .map(|x| (x.provenance, &x.permissions[..]))
        .collect()
}

#[test]
fn update_targets_the_direct_row() {
    let mut s = state(Workflow::Manage, shared_id_snapshot());
    assert!(s.update(Subject::user("u1").allowing(&["read", "write"])));
    assert_eq!(
        rows(&s, "u1"),
        vec![
            (Provenance::Extend, &[Permission::allow("read")][..]),
            (Provenance::Origin, &[Permission::allow("read"), Permission::allow("write")][..]),
        ]
    );
    assert!(s.has_changed());
    assert_eq!(ids(&s.change_set().unwrap().modified), vec!["u1"]);

    // Same for a subject that is also the owner
    assert!(s.update(Subject::user("u2").allowing(&["write"])));
    assert_eq!(rows(&s, "u2")[0], (Provenance::Owner, &[][..]));
    assert_eq!(s.get("u2").unwrap().permissions, vec![Permission::allow("write")]);
}

#[test]
fn batch_update_and_remove_target_the_direct_row() {
    let mut s = state(Workflow::Manage, shared_id_snapshot());
    assert_eq!(s.batch_update(&[SubjectPatch::new("u1").expires_at(Some(7))]), 1);
    assert_eq!(s.get("u1").unwrap().expires_at, Some(7));
    assert_eq!(s.get("u1").unwrap().provenance, Provenance::Origin);

    assert_eq!(s.remove("u1"), Ok(true));
    assert_eq!(rows(&s, "u1").len(), 1);
    assert_eq!(s.change_set().unwrap().removed, vec!["u1".to_string()]);

    // Only the inherited row is left now
    assert!(matches!(s.remove("u1"), Err(GrantError::NotRemovable { provenance: Provenance::Extend, .. })));
}

#[test]
fn inherited_subject_can_get_a_direct_grant() {
    let mut s = state(Workflow::Manage, full_snapshot());
    s.add(vec![Subject::user("g1").allowing(&["write"])], Position::Suffix).unwrap();
    assert_eq!(s.get("g1").unwrap().provenance, Provenance::New);
    assert_eq!(ids(&s.change_set().unwrap().added), vec!["g1"]);

    s.add(vec![Subject::user("owner")], Position::Suffix).unwrap();
    assert_eq!(
        s.add(vec![Subject::user("g1")], Position::Suffix),
        Err(GrantError::DuplicateSubject("g1".into()))
    );
}

// ============================================================================
// reset
// ============================================================================

#[test]
fn reset_restores_snapshot_entries() {
    let mut s = state(Workflow::Request, full_snapshot());
    let initial = s.working().to_vec();

    s.add(vec![Subject::user("new")], Position::Prefix).unwrap();
    s.update(Subject::user("u1").allowing(&["write"]));
    s.remove("u2").unwrap();
    s.reset_to_origin_or_clear();

    assert_eq!(s.working(), &initial[..]);
    assert_eq!(s.get("u2").unwrap().provenance, Provenance::Forbidden);
    assert!(!s.has_changed());
}

#[test]
fn reset_clears_when_only_staged_entries_remain() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    s.remove("u1").unwrap();
    s.add(vec![Subject::user("a"), Subject::user("b")], Position::Prefix).unwrap();
    s.reset_to_origin_or_clear();
    assert!(s.working().is_empty());
}

#[test]
fn reset_twice_equals_reset_once() {
    let mut s = state(Workflow::Manage, full_snapshot());
    s.add(vec![Subject::user("a")], Position::Prefix).unwrap();
    s.reset_to_origin_or_clear();
    let once = s.working().to_vec();
    s.reset_to_origin_or_clear();
    assert_eq!(s.working(), &once[..]);
}

// ============================================================================
// apply / rebase
// ============================================================================

#[test]
fn edit_script_replays_from_json() {
    let script = r#"[
        {"op": "add", "subjects": [{"subjectId": "u2", "subjectType": "app"}], "position": "suffix"},
        {"op": "batch_update", "patches": [{"subjectId": "u1", "expiresAt": 1000}]},
        {"op": "remove", "subjectId": "u2"},
        {"op": "add", "subjects": [{"subjectId": "u3"}]}
    ]"#;
    let edits: Vec<Edit> = serde_json::from_str(script).unwrap();
    let mut s = state(Workflow::Manage, snapshot_u1());
    for e in edits {
        s.apply(e).unwrap();
    }
    // Missing position falls back to the configured default (prefix)
    assert_eq!(ids(s.working()), vec!["u3", "u1"]);
    assert_eq!(s.get("u1").unwrap().expires_at, Some(1000));
}

#[test]
fn apply_propagates_store_errors() {
    let mut s = state(Workflow::Manage, full_snapshot());
    assert!(s.apply(Edit::Remove { subject_id: "g1".into() }).is_err());
    assert!(s.apply(Edit::Add { subjects: vec![Subject::user("u1")], position: None }).is_err());
}

#[test]
fn rebase_replaces_snapshot_and_working() {
    let mut s = state(Workflow::Manage, snapshot_u1());
    s.add(vec![Subject::user("u2")], Position::Prefix).unwrap();
    s.rebase(full_snapshot());
    assert_eq!(s.frozen().len(), 2);
    assert_eq!(s.inherited().len(), 1);
    assert_eq!(ids(s.working()), vec!["owner", "g1", "u1", "u2"]);
    assert!(!s.has_changed());
}
