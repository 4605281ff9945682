use std::future::Future;
use std::pin::Pin;

use pc_core::core::{
    failed_response_placeholder, ChatMessage, GenerationError, ResponseGenerator, Role,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bootstrap::BackendRuntime;

// ---------------------------------------------------------------------------
// ChatCompletionClient — samples responses from an OpenAI-compatible backend
// ---------------------------------------------------------------------------

pub struct ChatCompletionClient {
    http: reqwest::Client,
    backend: BackendRuntime,
}

impl ChatCompletionClient {
    pub fn new(backend: BackendRuntime) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = backend.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            backend,
        })
    }

    pub fn build_request_body(&self, system: &str, user: &str) -> ChatCompletionRequest<'_> {
        ChatCompletionRequest {
            model: &self.backend.model,
            messages: vec![
                ChatMessage::new(Role::System, system),
                ChatMessage::new(Role::User, user),
            ],
            temperature: self.backend.temperature,
            top_p: self.backend.top_p,
        }
    }

    /// One stateless completion call. Requests belonging to the same group
    /// share `conversation_id`; each carries its own turn id.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        conversation_id: &Uuid,
    ) -> Result<String, GenerationError> {
        let body = self.build_request_body(system, user);
        let mut req = self
            .http
            .post(&self.backend.endpoint)
            .header("X-Conversation-Id", conversation_id.to_string())
            .header("X-Turn-Id", Uuid::new_v4().to_string())
            .json(&body);
        if let Some(key) = &self.backend.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .map(|v| v.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body: message,
            });
        }

        parse_response(&bytes)
    }
}

impl ResponseGenerator for ChatCompletionClient {
    fn generate<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
        n: usize,
    ) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'a>> {
        Box::pin(async move {
            let conversation_id = Uuid::new_v4();
            let mut responses = Vec::with_capacity(n);
            for i in 0..n {
                match self.complete(system, user, &conversation_id).await {
                    Ok(text) => responses.push(text),
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            response = i + 1,
                            conversation_id = %conversation_id,
                            "completion call failed"
                        );
                        responses.push(failed_response_placeholder(i, &err));
                    }
                }
                if i + 1 < n && !self.backend.request_delay.is_zero() {
                    tokio::time::sleep(self.backend.request_delay).await;
                }
            }
            responses
        })
    }
}

/// Extracts the first choice's message text; a `null` content is empty text.
pub fn parse_response(body: &[u8]) -> Result<String, GenerationError> {
    let resp: OaiResponseWire = serde_json::from_slice(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or(GenerationError::EmptyChoices)
}

// ---------------------------------------------------------------------------
// Request wire type
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
}

// ---------------------------------------------------------------------------
// Response wire types (Deserialize only)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct OaiResponseWire {
    choices: Vec<OaiChoiceWire>,
}

#[derive(Deserialize)]
struct OaiChoiceWire {
    message: OaiMessageWire,
}

#[derive(Deserialize)]
struct OaiMessageWire {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
