use std::future::Future;
use std::pin::Pin;

use crate::core::{
    BatchProgress, GenerationError, PreferencePair, PromptSourceError, SessionSnapshot, StoreError,
};

// ---------------------------------------------------------------------------
// ResponseGenerator — samples N responses for one prompt pair
// ---------------------------------------------------------------------------

/// Produces `n` independently sampled responses.
///
/// Implementations never fail as a whole: a failed call occupies its slot
/// with [`failed_response_placeholder`], so the result always has `n` entries.
pub trait ResponseGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        n: usize,
    ) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'a>>;
}

/// Inline text shown in place of response `index` (0-based) when its call failed.
pub fn failed_response_placeholder(index: usize, err: &GenerationError) -> String {
    format!("API 在生成第 #{} 个回复时出错: {err}", index + 1)
}

// ---------------------------------------------------------------------------
// SystemPromptSource — the system prompts for a new round
// ---------------------------------------------------------------------------

pub trait SystemPromptSource: Send + Sync {
    fn load(&self) -> Result<Vec<String>, PromptSourceError>;
}

// ---------------------------------------------------------------------------
// SessionStore — single-slot snapshot persistence
// ---------------------------------------------------------------------------

pub trait SessionStore: Send + Sync {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    /// Returns `Ok(None)` when no snapshot has been saved.
    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// DatasetSink — append-only preference pair output
// ---------------------------------------------------------------------------

pub trait DatasetSink: Send + Sync {
    /// Appends `pairs` in one write and returns how many were written.
    fn append(&self, pairs: &[PreferencePair]) -> Result<usize, StoreError>;
}

// ---------------------------------------------------------------------------
// ProgressObserver — receives batch progress while generation runs
// ---------------------------------------------------------------------------

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: BatchProgress);
}

pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _progress: BatchProgress) {}
}
