use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::grades::{is_placeholder, Evaluation};
use crate::snapshot::StateSnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewGrade,
    PlaceholderFilled,
    GradeUpdated,
    GradeRetracted,
    Unchanged,
}

impl ChangeKind {
    pub fn escalates(self, is_initialization: bool) -> bool {
        match self {
            Self::NewGrade => !is_initialization,
            Self::PlaceholderFilled => true,
            Self::GradeUpdated | Self::GradeRetracted | Self::Unchanged => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub evaluation: Evaluation,
    pub old_grade: Option<String>,
    pub new_grade: String,
    pub escalate: bool,
}

pub fn classify(stored: Option<&str>, fresh: &str) -> ChangeKind {
    match stored {
        None => ChangeKind::NewGrade,
        Some(old) if old == fresh => ChangeKind::Unchanged,
        Some(old) => match (is_placeholder(old), is_placeholder(fresh)) {
            (true, false) => ChangeKind::PlaceholderFilled,
            (false, false) => ChangeKind::GradeUpdated,
            (false, true) => ChangeKind::GradeRetracted,
            (true, true) => ChangeKind::Unchanged,
        },
    }
}

/// Diffs freshly fetched evaluations against `snapshot`, updating it in
/// place. Evaluations without a grade are ignored entirely; placeholders
/// seen for the first time are stored without an event.
pub fn diff(
    evaluations: &[Evaluation],
    snapshot: &mut StateSnapshot,
    is_initialization: bool,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for evaluation in evaluations {
        let Some(fresh) = evaluation.grade_value() else {
            continue;
        };
        let kind = classify(snapshot.get(&evaluation.id), fresh);
        if kind == ChangeKind::Unchanged {
            continue;
        }
        let old_grade = snapshot.record(&evaluation.id, fresh);

        match kind {
            ChangeKind::NewGrade if is_placeholder(fresh) => continue,
            ChangeKind::NewGrade => info!(
                "new evaluation: {} - {} ({fresh})",
                evaluation.module_title, evaluation.description
            ),
            ChangeKind::GradeRetracted => warn!(
                "grade withdrawn: {} - {} ({} -> {fresh})",
                evaluation.module_title,
                evaluation.description,
                old_grade.as_deref().unwrap_or_default()
            ),
            _ => info!(
                "grade updated: {} - {} ({} -> {fresh})",
                evaluation.module_title,
                evaluation.description,
                old_grade.as_deref().unwrap_or_default()
            ),
        }

        events.push(ChangeEvent {
            kind,
            evaluation: evaluation.clone(),
            old_grade,
            new_grade: fresh.to_string(),
            escalate: kind.escalates(is_initialization),
        });
    }
    events
}
