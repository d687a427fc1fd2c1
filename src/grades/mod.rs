pub mod engine;
pub mod extract;

use serde::{Deserialize, Serialize};

pub use engine::{classify, diff, ChangeEvent, ChangeKind};
pub use extract::{extract_evaluations, Extraction};

/// Grade string the portal shows for an evaluation that exists but has not
/// been graded yet.
pub const PLACEHOLDER_GRADE: &str = "~";

pub fn is_placeholder(grade: &str) -> bool {
    grade.trim() == PLACEHOLDER_GRADE
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeStats {
    pub mean: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub description: String,
    pub module_code: String,
    pub module_title: String,
    pub grade: Option<String>,
    #[serde(default)]
    pub stats: GradeStats,
}

impl Evaluation {
    pub fn grade_value(&self) -> Option<&str> {
        self.grade.as_deref().filter(|g| !g.is_empty())
    }

    pub fn module_label(&self) -> String {
        format!("{} - {}", self.module_code, self.module_title)
    }
}

#[cfg(test)]
pub(crate) fn evaluation(id: &str, grade: Option<&str>) -> Evaluation {
    Evaluation {
        id: id.to_string(),
        description: format!("Contrôle {id}"),
        module_code: "R1.01".to_string(),
        module_title: "Initiation au développement".to_string(),
        grade: grade.map(str::to_string),
        stats: GradeStats::default(),
    }
}
