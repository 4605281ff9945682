// ---------------------------------------------------------------------------
// Sub-error types
// ---------------------------------------------------------------------------

/// Failure of a single chat-completion call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("backend connection failed: {0}")]
    Connection(String),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("completion response contained no choices")]
    EmptyChoices,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PromptSourceError {
    #[error("failed to read system prompts from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse system prompts from {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// A transition that was rejected without changing the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("user prompt must not be empty")]
    EmptyUserPrompt,
    #[error("response count must be between 1 and {max}, got {requested}")]
    InvalidResponseCount { requested: usize, max: usize },
    #[error("no system prompts available")]
    NoSystemPrompts,
    #[error(transparent)]
    PromptSource(#[from] PromptSourceError),
    #[error("no annotation round in progress")]
    NoActiveRound,
    #[error("all generation groups have already been reviewed")]
    RoundComplete,
}

impl SessionError {
    /// Errors caused by operator input or configuration rather than state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyUserPrompt
                | Self::InvalidResponseCount { .. }
                | Self::NoSystemPrompts
                | Self::PromptSource(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
