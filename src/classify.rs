//! Provenance classifier
//!
//! Builds the initial working set from a persisted snapshot. Output order is
//! owner row, inherited subjects, then direct subjects; the diff engine sorts
//! on its own, so ordering here is display-only.

use crate::config::EngineConfig;
use crate::filter::Workflow;
use crate::remote::PolicySnapshot;
use crate::subject::{Provenance, Subject};

/// Tag for a direct snapshot subject.
///
/// During a request, a subject already holding `forbidden_threshold` or more
/// permissions is locked so the request can't broaden it.
pub fn origin_tag(workflow: Workflow, subject: &Subject, config: &EngineConfig) -> Provenance {
    match workflow {
        Workflow::Request if subject.permissions.len() >= config.forbidden_threshold => Provenance::Forbidden,
        _ => Provenance::Origin,
    }
}

/// Synthetic owner row, if the snapshot names an owner
pub fn owner_row(snapshot: &PolicySnapshot) -> Option<Subject> {
    snapshot.owner_id.as_ref().map(|id| {
        Subject::user(id.clone())
            .with_name(snapshot.owner_name.clone().unwrap_or_default())
            .tagged(Provenance::Owner)
    })
}

/// Initial working set for a snapshot.
///
/// `current_subject_id` is the acting user; when they hold a direct grant it
/// is listed first among the direct subjects.
pub fn classify(
    snapshot: &PolicySnapshot,
    workflow: Workflow,
    current_subject_id: Option<&str>,
    config: &EngineConfig,
) -> Vec<Subject> {
    let mut out = Vec::with_capacity(1 + snapshot.subjects_extend.len() + snapshot.subjects.len());
    out.extend(owner_row(snapshot));
    out.extend(snapshot.subjects_extend.iter().map(|s| s.clone().tagged(Provenance::Extend)));

    let (mine, others): (Vec<&Subject>, Vec<&Subject>) = snapshot
        .subjects
        .iter()
        .partition(|s| current_subject_id == Some(s.subject_id.as_str()));
    out.extend(
        mine.into_iter()
            .chain(others)
            .map(|s| s.clone().tagged(origin_tag(workflow, s, config))),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PolicySnapshot {
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

    fn tags(v: &[Subject]) -> Vec<(&str, Provenance)> {
        v.iter().map(|s| (s.subject_id.as_str(), s.provenance)).collect()
    }

    #[test]
    fn manage_never_forbids() {
        let out = classify(&snapshot(), Workflow::Manage, None, &EngineConfig::default());
        assert_eq!(
            tags(&out),
            vec![
                ("owner", Provenance::Owner),
                ("g1", Provenance::Extend),
                ("u1", Provenance::Origin),
                ("u2", Provenance::Origin),
            ]
        );
        assert_eq!(out[0].display_name, "Olga");
    }

    #[test]
    fn request_forbids_broad_origin_grants() {
        let out = classify(&snapshot(), Workflow::Request, None, &EngineConfig::default());
        assert_eq!(out[3].provenance, Provenance::Forbidden);
        assert_eq!(out[2].provenance, Provenance::Origin);
    }

    #[test]
    fn threshold_is_configurable() {
        let cfg = EngineConfig { forbidden_threshold: 1, ..EngineConfig::default() };
        let out = classify(&snapshot(), Workflow::Request, None, &cfg);
        assert_eq!(out[2].provenance, Provenance::Forbidden);
    }

    #[test]
    fn inherited_subjects_are_never_forbidden() {
        let mut snap = snapshot();
        snap.subjects_extend[0] = Subject::user("g1").allowing(&["read", "write", "auth"]);
        let out = classify(&snap, Workflow::Request, None, &EngineConfig::default());
        assert_eq!(out[1].provenance, Provenance::Extend);
    }

    #[test]
    fn acting_user_listed_first_among_direct() {
        let out = classify(&snapshot(), Workflow::Manage, Some("u2"), &EngineConfig::default());
        let ids: Vec<_> = out.iter().map(|s| s.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["owner", "g1", "u2", "u1"]);
    }

    #[test]
    fn no_owner_no_owner_row() {
        let snap = PolicySnapshot { owner_id: None, ..snapshot() };
        let out = classify(&snap, Workflow::Manage, None, &EngineConfig::default());
        assert!(out.iter().all(|s| s.provenance != Provenance::Owner));
    }
}
