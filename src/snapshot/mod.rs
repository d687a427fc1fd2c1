pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Last known grade string per evaluation id. Entries are only ever added
/// or overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    grades: BTreeMap<String, String>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.grades.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.grades.contains_key(id)
    }

    pub fn record(&mut self, id: &str, grade: &str) -> Option<String> {
        self.grades.insert(id.to_string(), grade.to_string())
    }

    pub fn len(&self) -> usize {
        self.grades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.grades.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            grades: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
