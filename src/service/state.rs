//! Persisted lifecycle state.
//!
//! Written with the temp-file/sync/rename sequence so a crash leaves either
//! the previous file or the new one, never a torn write.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::service::StateError;

/// Process-wide lifecycle flags that survive restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleState {
    /// Whether the host last called `start` (and not `stop` since).
    #[serde(default)]
    pub is_started: bool,
}

impl LifecycleState {
    /// Load the state at `path`; a missing file is the default state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace the state file at `path`.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(self)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&content)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let state = LifecycleState::load(&dir.path().join("state.json")).unwrap();
        assert!(!state.is_started);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        LifecycleState { is_started: true }.save(&path).unwrap();
        assert!(LifecycleState::load(&path).unwrap().is_started);
        assert!(!path.with_extension("tmp").exists());

        LifecycleState { is_started: false }.save(&path).unwrap();
        assert!(!LifecycleState::load(&path).unwrap().is_started);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            LifecycleState::load(&path),
            Err(StateError::Format(_))
        ));
    }
}
