use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure};
use pc_core::core::{AnnotationSession, ProgressObserver, ResponseLimits, SessionPorts};
use pc_store::{JsonSessionStore, JsonlDatasetWriter};

use crate::config::AppConfig;
use crate::outbound::ChatCompletionClient;
use crate::prompts::ConfiguredPrompts;

// ---------------------------------------------------------------------------
// BackendRuntime — validated chat-completion backend settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct BackendRuntime {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub request_delay: Duration,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

// ---------------------------------------------------------------------------
// RuntimeConfig — fully validated runtime configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub listen_addr: String,
    pub backend: BackendRuntime,
    pub limits: ResponseLimits,
    pub output_file: PathBuf,
    pub session_file: PathBuf,
    pub initial_user_prompt: String,
    pub system_prompts: Vec<String>,
    pub system_prompts_file: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
}

// ---------------------------------------------------------------------------
// into_runtime — converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    let backend = config.backend;
    ensure!(!backend.model.trim().is_empty(), "backend model must not be empty");
    ensure!(
        backend.base_url.starts_with("http://") || backend.base_url.starts_with("https://"),
        "backend base_url must start with http:// or https://: {}",
        backend.base_url
    );
    ensure!(
        (0.0..=2.0).contains(&backend.temperature),
        "temperature must be within 0..=2, got {}",
        backend.temperature
    );
    ensure!(
        backend.top_p > 0.0 && backend.top_p <= 1.0,
        "top_p must be within (0, 1], got {}",
        backend.top_p
    );

    let annotation = config.annotation;
    ensure!(
        annotation.max_responses >= 1,
        "max_responses must be at least 1"
    );
    ensure!(
        (1..=annotation.max_responses).contains(&annotation.default_responses),
        "default_responses must be between 1 and max_responses ({}), got {}",
        annotation.max_responses,
        annotation.default_responses
    );
    ensure!(
        annotation.output_file != annotation.session_file,
        "output_file and session_file must differ: {}",
        annotation.output_file.display()
    );

    let log_format = match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        other => bail!("unknown logging format: {other} (expected json or pretty)"),
    };

    Ok(RuntimeConfig {
        listen_addr: config.server.listen,
        backend: BackendRuntime {
            endpoint: completions_endpoint(&backend.base_url),
            model: backend.model,
            api_key: backend.api_key.filter(|key| !key.is_empty()),
            temperature: backend.temperature,
            top_p: backend.top_p,
            request_delay: Duration::from_millis(backend.request_delay_ms),
            timeout: backend.timeout_ms.map(Duration::from_millis),
        },
        limits: ResponseLimits {
            default: annotation.default_responses,
            max: annotation.max_responses,
        },
        output_file: annotation.output_file,
        session_file: annotation.session_file,
        initial_user_prompt: annotation.initial_user_prompt,
        system_prompts: annotation.system_prompts,
        system_prompts_file: annotation.system_prompts_file,
        log_level: config.logging.level,
        log_format,
    })
}

/// Accepts both `http://host:port` and OpenAI-SDK style `http://host:port/v1`.
fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

// ---------------------------------------------------------------------------
// build_session — wires the file stores and the backend client together
// ---------------------------------------------------------------------------

pub fn build_session(
    runtime: &RuntimeConfig,
    progress: Arc<dyn ProgressObserver>,
) -> Result<AnnotationSession, anyhow::Error> {
    let client = ChatCompletionClient::new(runtime.backend.clone())?;
    let ports = SessionPorts {
        generator: Arc::new(client),
        prompts: Arc::new(ConfiguredPrompts::new(
            runtime.system_prompts.clone(),
            runtime.system_prompts_file.clone(),
        )),
        store: Arc::new(JsonSessionStore::new(&runtime.session_file)),
        dataset: Arc::new(JsonlDatasetWriter::new(&runtime.output_file)),
        progress,
    };
    Ok(AnnotationSession::new(ports, runtime.limits))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
