use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use pc_core::core::{DatasetSink, PreferencePair, StoreError};

/// Append-only JSON Lines output. Existing content is never read or rewritten.
pub struct JsonlDatasetWriter {
    path: PathBuf,
}

impl JsonlDatasetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSink for JsonlDatasetWriter {
    fn append(&self, pairs: &[PreferencePair]) -> Result<usize, StoreError> {
        if pairs.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::new();
        for pair in pairs {
            serde_json::to_writer(&mut buf, pair)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buf)?;
        file.flush()?;

        tracing::info!(
            path = %self.path.display(),
            records = pairs.len(),
            "appended records to dataset"
        );
        Ok(pairs.len())
    }
}
