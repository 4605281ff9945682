use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:7860".to_owned(),
        }
    }
}

/// OpenAI-compatible chat-completion backend used for sampling.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_sampling")]
    pub temperature: f64,
    #[serde(default = "default_sampling")]
    pub top_p: f64,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Per-request timeout; unset means the transport default.
    pub timeout_ms: Option<u64>,
}

fn default_sampling() -> f64 {
    0.95
}

fn default_request_delay_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub output_file: PathBuf,
    pub session_file: PathBuf,
    pub default_responses: usize,
    pub max_responses: usize,
    pub initial_user_prompt: String,
    pub system_prompts: Vec<String>,
    /// JSON array of strings, re-read at the start of every batch.
    pub system_prompts_file: Option<PathBuf>,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("dpo_dataset.jsonl"),
            session_file: PathBuf::from("annotation_session.json"),
            default_responses: 3,
            max_responses: 20,
            initial_user_prompt: String::new(),
            system_prompts: Vec::new(),
            system_prompts_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "json".to_owned(),
        }
    }
}
