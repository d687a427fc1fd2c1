use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::snapshot::StateSnapshot;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> StateSnapshot {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no state file at {}", self.path.display());
                return StateSnapshot::new();
            }
            Err(err) => {
                warn!("failed reading state file {}: {err}", self.path.display());
                return StateSnapshot::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("ignoring corrupt state file {}: {err}", self.path.display());
                StateSnapshot::new()
            }
        }
    }

    /// Writes through a sibling temp file, then renames it over the target.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
