use std::path::PathBuf;

use pc_core::core::{PromptSourceError, SystemPromptSource};

/// System prompts from the config file plus an optional JSON prompt file.
///
/// The file is read on every call so prompts can be edited between rounds
/// without restarting. Blank prompts are dropped.
pub struct ConfiguredPrompts {
    inline: Vec<String>,
    file: Option<PathBuf>,
}

impl ConfiguredPrompts {
    pub fn new(inline: Vec<String>, file: Option<PathBuf>) -> Self {
        Self { inline, file }
    }
}

impl SystemPromptSource for ConfiguredPrompts {
    fn load(&self) -> Result<Vec<String>, PromptSourceError> {
        let mut prompts = self.inline.clone();

        if let Some(path) = &self.file {
            let content =
                std::fs::read_to_string(path).map_err(|source| PromptSourceError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            let from_file: Vec<String> =
                serde_json::from_str(&content).map_err(|source| PromptSourceError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            prompts.extend(from_file);
        }

        prompts.retain(|p| !p.trim().is_empty());
        tracing::info!(count = prompts.len(), "loaded system prompts");
        Ok(prompts)
    }
}
