use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationGroup — one system/user prompt pair and its sampled responses
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationGroup {
    pub system: String,
    pub user: String,
    pub responses: Vec<String>,
}

// ---------------------------------------------------------------------------
// PreferencePair — one DPO training record
// ---------------------------------------------------------------------------

/// A chosen/rejected pair in the chat-messages DPO layout.
///
/// `messages` always holds exactly three entries: the system prompt, the user
/// prompt, and the chosen assistant response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePair {
    pub messages: Vec<ChatMessage>,
    pub rejected_response: String,
}

impl PreferencePair {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        chosen: impl Into<String>,
        rejected: impl Into<String>,
    ) -> Self {
        Self {
            messages: vec![
                ChatMessage::new(Role::System, system),
                ChatMessage::new(Role::User, user),
                ChatMessage::new(Role::Assistant, chosen),
            ],
            rejected_response: rejected.into(),
        }
    }

    pub fn chosen(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn rejected(&self) -> &str {
        &self.rejected_response
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot — the whole recoverable annotation state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(rename = "annotation_queue")]
    pub queue: Vec<GenerationGroup>,
    #[serde(rename = "current_index")]
    pub cursor: usize,
    #[serde(rename = "dpo_data")]
    pub dataset: Vec<PreferencePair>,
}

impl SessionSnapshot {
    pub fn new(queue: Vec<GenerationGroup>) -> Self {
        Self {
            queue,
            cursor: 0,
            dataset: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    pub fn current_group(&self) -> Option<&GenerationGroup> {
        self.queue.get(self.cursor)
    }
}

// ---------------------------------------------------------------------------
// Phase — coarse state of the annotation session
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Empty,
    Reviewing,
    Complete,
}

// ---------------------------------------------------------------------------
// BatchProgress — generation groups finished in the running batch
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn is_running(&self) -> bool {
        self.total > 0 && self.completed < self.total
    }
}

// ---------------------------------------------------------------------------
// ResponseLimits — bounds on the per-group response count
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseLimits {
    pub default: usize,
    pub max: usize,
}

impl Default for ResponseLimits {
    fn default() -> Self {
        Self { default: 3, max: 20 }
    }
}

// ---------------------------------------------------------------------------
// Notice — operator-facing notification produced by a transition
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
