//! HTTP client for the document chat endpoint.
//!
//! Wire contract: `POST <chat_url>` with
//! `{ rfp_title, question, context?: {key: text} }`, answered by
//! `{ status: "success", response: { bot_response, replacement_text } }`
//! or `{ status: <other>, message }`.

use crate::config::EndpointConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use redline_core::replace::ReplacementMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Fixed timeout for a single chat or image request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Outbound payload for one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurnRequest {
    /// Document title, sent under the endpoint's historical field name.
    pub rfp_title: String,
    /// The user's question.
    pub question: String,
    /// Attached context fragments keyed by their store key. Omitted
    /// entirely when no context is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

/// The useful part of a successful chat response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatTurnReply {
    pub bot_response: String,
    /// Proposed replacements grouped by context key. Often empty.
    #[serde(default)]
    pub replacement_text: ReplacementMap,
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    status: String,
    #[serde(default)]
    response: Option<ChatTurnReply>,
    #[serde(default)]
    message: Option<String>,
}

/// The chat endpoint as a capability, so the orchestrator can be tested
/// against an in-memory double.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn send(&self, request: &ChatTurnRequest) -> Result<ChatTurnReply, TransportError>;
}

/// Reqwest-backed implementation of [`ChatEndpoint`].
#[derive(Clone)]
pub struct HttpChatClient {
    client: Client,
    url: String,
}

impl HttpChatClient {
    /// Creates a client with the fixed default timeout.
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(url, REQUEST_TIMEOUT)
    }

    /// Creates a client with an explicit timeout.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Builds the client from an [`EndpointConfig`].
    pub fn from_config(config: &EndpointConfig) -> anyhow::Result<Self> {
        Self::with_timeout(&config.chat_url, config.timeout())
    }
}

#[async_trait]
impl ChatEndpoint for HttpChatClient {
    async fn send(&self, request: &ChatTurnRequest) -> Result<ChatTurnReply, TransportError> {
        tracing::debug!(target: "chat_api", url = %self.url, "dispatching chat turn");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            tracing::warn!(target: "chat_api", %status, "chat endpoint returned an error status");
            return Err(TransportError::ServerError(format!("HTTP {status}: {body}")));
        }

        let envelope: ChatEnvelope = response
            .json()
            .await
            .map_err(|err| TransportError::MalformedResponse(err.to_string()))?;

        if envelope.status != "success" {
            return Err(TransportError::ServerError(
                envelope
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        envelope.response.ok_or_else(|| {
            TransportError::MalformedResponse("success envelope without a response body".to_string())
        })
    }
}
