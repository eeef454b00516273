//! HTTP client for the resume assistant endpoint with streaming support.
//!
//! # Architecture
//!
//! - [`AssistClient::stream_assist`] - POST one turn to `{base}/api/ai-assist/{section}`
//!   and decode the streamed body
//! - [`AssistClient::reset_limits`] - POST `{base}/api/ai-assist/reset-limits`
//! - [`stream`] - Incremental line decoder for the event protocol
//!
//! Decoded events are delivered through a [`tokio::sync::mpsc::Sender<AssistEvent>`]
//! channel, allowing the caller to apply streamed content as it arrives.
//!
//! # Streaming Events
//!
//! | Wire `type` | Event | Description |
//! |-------------|-------|-------------|
//! | `content` | `Content` | Incremental assistant text |
//! | `suggestion` | `Suggestion` | Raw structured payload for the section |
//! | `rate_limit` | `RateLimit` | Remaining request counters |
//! | `done` | `Done` | Turn completed successfully |
//! | `error` | `Error` | Turn terminated with an error |
//!
//! # Error Handling
//!
//! Transport failures, non-2xx responses, and malformed bodies are delivered as
//! `AssistEvent::Error` rather than `Result::Err`, so text streamed before the
//! failure is kept. No request is retried.

pub mod stream;

pub use scribe_types;
pub use stream::{AssistEvent, DecodeError, LineBuffer, parse_event_line, process_event_stream};

use std::time::Duration;

use scribe_types::{Message, ResumeContext, Role, Section};
use serde::Serialize;
use tokio::sync::mpsc;

/// Default assistant server for local development.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// TCP keepalive for long-lived streamed responses
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shown when a failed response carries no usable error text.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to get AI response";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
}

fn base_client_builder(connect_timeout: Duration) -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("text/event-stream"),
    );

    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// One prior turn replayed to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Outbound body for one `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct AssistRequest {
    pub user_message: String,
    pub conversation_history: Vec<ConversationTurn>,
    pub resume_context: ResumeContext,
    pub session_id: String,
    pub stream: bool,
}

impl AssistRequest {
    /// Build a streaming request. System messages in `prior` are not replayed.
    #[must_use]
    pub fn new(
        user_message: impl Into<String>,
        prior: &[Message],
        resume_context: ResumeContext,
        session_id: impl Into<String>,
    ) -> Self {
        let conversation_history = prior
            .iter()
            .filter(|msg| msg.role().is_conversational())
            .map(|msg| ConversationTurn {
                role: msg.role(),
                content: msg.content().to_string(),
            })
            .collect();

        Self {
            user_message: user_message.into(),
            conversation_history,
            resume_context,
            session_id: session_id.into(),
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResetLimitsRequest<'a> {
    session_id: &'a str,
    section: Section,
}

/// Client bound to one assistant server.
#[derive(Debug, Clone)]
pub struct AssistClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssistClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_connect_timeout(base_url, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = base_client_builder(connect_timeout).build()?;
        Ok(Self::with_http(http, base_url))
    }

    #[must_use]
    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn section_url(&self, section: Section) -> String {
        format!("{}/api/ai-assist/{}", self.base_url, section.as_str())
    }

    #[must_use]
    pub fn reset_limits_url(&self) -> String {
        format!("{}/api/ai-assist/reset-limits", self.base_url)
    }

    /// Send one turn and stream its decoded events through `tx`.
    ///
    /// Every outcome, including failures, ends with exactly one terminal event
    /// unless the receiver is dropped first.
    pub async fn stream_assist(
        &self,
        section: Section,
        request: &AssistRequest,
        tx: &mpsc::Sender<AssistEvent>,
    ) {
        let response = match self
            .http
            .post(self.section_url(section))
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%e, section = %section, "Assistant request failed");
                let _ = tx
                    .send(AssistEvent::Error(format!("Request failed: {e}")))
                    .await;
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            tracing::warn!(%status, section = %section, "Assistant returned an error status");
            let _ = tx
                .send(AssistEvent::Error(error_message_from_body(&body)))
                .await;
            return;
        }

        process_event_stream(response.bytes_stream(), tx).await;
    }

    /// Ask the server to reset this session's counters for `section`.
    pub async fn reset_limits(&self, session_id: &str, section: Section) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.reset_limits_url())
            .json(&ResetLimitsRequest {
                session_id,
                section,
            })
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = read_capped_error_body(response).await;
        Err(ClientError::Status {
            status,
            message: error_message_from_body(&body),
        })
    }
}

/// Extract the display text from a non-2xx body of the form `{"error": "..."}`.
#[must_use]
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|msg| !msg.is_empty())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            break;
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
