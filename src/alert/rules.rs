use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewGrade,
    GradeUpdated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertRules {
    #[serde(default = "default_true")]
    pub new_grade: bool,
    #[serde(default = "default_true")]
    pub grade_updated: bool,
}

impl AlertRules {
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::NewGrade => self.new_grade,
            NotificationKind::GradeUpdated => self.grade_updated,
        }
    }
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            new_grade: true,
            grade_updated: true,
        }
    }
}

fn default_true() -> bool {
    true
}
