use serde::{Deserialize, Serialize};

use crate::alert::rules::{AlertRules, NotificationKind};
use crate::grades::{ChangeEvent, ChangeKind, GradeStats};

/// What leaves the process for one change. Updates carry no grade values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Notification {
    NewGrade {
        module_code: String,
        module_title: String,
        evaluation: String,
        grade: String,
        stats: GradeStats,
        escalate: bool,
    },
    GradeUpdated {
        module_code: String,
        module_title: String,
        evaluation: String,
    },
}

impl Notification {
    pub fn from_event(event: &ChangeEvent) -> Option<Self> {
        let evaluation = &event.evaluation;
        match event.kind {
            ChangeKind::NewGrade | ChangeKind::PlaceholderFilled => Some(Self::NewGrade {
                module_code: evaluation.module_code.clone(),
                module_title: evaluation.module_title.clone(),
                evaluation: evaluation.description.clone(),
                grade: event.new_grade.clone(),
                stats: evaluation.stats.clone(),
                escalate: event.escalate,
            }),
            ChangeKind::GradeUpdated => Some(Self::GradeUpdated {
                module_code: evaluation.module_code.clone(),
                module_title: evaluation.module_title.clone(),
                evaluation: evaluation.description.clone(),
            }),
            ChangeKind::GradeRetracted | ChangeKind::Unchanged => None,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NewGrade { .. } => NotificationKind::NewGrade,
            Self::GradeUpdated { .. } => NotificationKind::GradeUpdated,
        }
    }

    pub fn module_label(&self) -> String {
        let (Self::NewGrade {
            module_code,
            module_title,
            ..
        }
        | Self::GradeUpdated {
            module_code,
            module_title,
            ..
        }) = self;
        format!("{module_code} - {module_title}")
    }

    pub fn evaluation(&self) -> &str {
        match self {
            Self::NewGrade { evaluation, .. } | Self::GradeUpdated { evaluation, .. } => evaluation,
        }
    }

    pub fn escalate(&self) -> bool {
        matches!(self, Self::NewGrade { escalate: true, .. })
    }
}

pub fn build_notifications(events: &[ChangeEvent], rules: &AlertRules) -> Vec<Notification> {
    events
        .iter()
        .filter_map(Notification::from_event)
        .filter(|notification| rules.allows(notification.kind()))
        .collect()
}
