use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pc_core::core::{SessionSnapshot, SessionStore, StoreError};
use serde::Serialize;

/// Session snapshot kept in a single pretty-printed JSON file.
///
/// Saves go through a sibling `*.tmp` file and a rename, so a crash mid-write
/// leaves either the previous snapshot or the new one, never a torn file.
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        snapshot.serialize(&mut serializer)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, &buf)?;
        fs::rename(&temp, &self.path)?;

        tracing::info!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot: SessionSnapshot = serde_json::from_slice(&bytes)?;
        tracing::info!(path = %self.path.display(), "session loaded");
        Ok(Some(snapshot))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
