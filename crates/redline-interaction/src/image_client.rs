//! HTTP client for the image-generation endpoint.
//!
//! Wire contract: `POST <image_url>` with
//! `{ prompt, image_call_id: id|null, conversation_id: id|null }`,
//! answered by `{ success, image_base64?, image_call_id?,
//! conversation_id?, message?, error? }`. The ids are opaque; holding
//! them across calls turns the next prompt into a modification of the
//! previous image.

use crate::chat_client::REQUEST_TIMEOUT;
use crate::config::EndpointConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound payload for one image-generation call. The ids serialize as
/// explicit `null` on the first call of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub image_call_id: Option<String>,
    pub conversation_id: Option<String>,
}

/// A successful image generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationReply {
    /// Raw base64 image data (data-URL prefix already stripped).
    pub image_base64: String,
    pub image_call_id: Option<String>,
    pub conversation_id: Option<String>,
    /// Optional status text from the endpoint.
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageEnvelope {
    success: bool,
    #[serde(default)]
    image_base64: Option<String>,
    #[serde(default)]
    image_call_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// The image endpoint as a capability.
#[async_trait]
pub trait ImageEndpoint: Send + Sync {
    async fn generate(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<ImageGenerationReply, TransportError>;
}

/// Reqwest-backed implementation of [`ImageEndpoint`].
#[derive(Clone)]
pub struct HttpImageClient {
    client: Client,
    url: String,
}

impl HttpImageClient {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &EndpointConfig) -> anyhow::Result<Self> {
        Self::with_timeout(&config.image_url, config.timeout())
    }
}

#[async_trait]
impl ImageEndpoint for HttpImageClient {
    async fn generate(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<ImageGenerationReply, TransportError> {
        tracing::debug!(
            target: "image_api",
            url = %self.url,
            modifying = request.image_call_id.is_some(),
            "dispatching image generation"
        );

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
            tracing::warn!(target: "image_api", %status, "image endpoint returned an error status");
            return Err(TransportError::ServerError(format!("HTTP {status}: {body}")));
        }

        let envelope: ImageEnvelope = response
            .json()
            .await
            .map_err(|err| TransportError::MalformedResponse(err.to_string()))?;

        let Some(image_base64) = envelope.image_base64.filter(|_| envelope.success) else {
            return Err(TransportError::ServerError(
                envelope
                    .message
                    .or(envelope.error)
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        };

        Ok(ImageGenerationReply {
            image_base64: normalize_image_payload(&image_base64)?,
            image_call_id: envelope.image_call_id,
            conversation_id: envelope.conversation_id,
            message: envelope.message,
        })
    }
}

/// Strips a `data:` URL wrapper when present and validates that the
/// remainder decodes as base64.
///
/// # Errors
///
/// [`TransportError::MalformedResponse`] when the payload is empty, the
/// data URL has no base64 marker, or the data does not decode.
pub fn normalize_image_payload(data: &str) -> Result<String, TransportError> {
    let raw = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once("base64,")
            .map(|(_, b64)| b64)
            .ok_or_else(|| {
                TransportError::MalformedResponse(
                    "image data URL without a base64 payload".to_string(),
                )
            })?,
        None => data,
    };

    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TransportError::MalformedResponse(
            "empty image payload".to_string(),
        ));
    }

    BASE64_STANDARD.decode(raw).map_err(|err| {
        TransportError::MalformedResponse(format!("image payload is not valid base64: {err}"))
    })?;

    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_call_serializes_ids_as_null() {
        let request = ImageGenerationRequest {
            prompt: "a lighthouse at dusk".to_string(),
            image_call_id: None,
            conversation_id: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "prompt": "a lighthouse at dusk",
                "image_call_id": null,
                "conversation_id": null
            })
        );
    }

    #[test]
    fn success_envelope_deserializes() {
        let body = json!({
            "success": true,
            "image_base64": "aGVsbG8=",
            "image_call_id": "call-9",
            "conversation_id": "conv-3",
            "message": "done"
        });

        let envelope: ImageEnvelope = serde_json::from_value(body).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.image_base64.as_deref(), Some("aGVsbG8="));
        assert_eq!(envelope.image_call_id.as_deref(), Some("call-9"));
    }

    #[test]
    fn failure_envelope_tolerates_missing_fields() {
        let body = json!({"success": false, "error": "quota exceeded"});
        let envelope: ImageEnvelope = serde_json::from_value(body).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("quota exceeded"));
        assert!(envelope.image_base64.is_none());
    }

    #[test]
    fn normalize_accepts_raw_base64() {
        assert_eq!(normalize_image_payload("aGVsbG8=").unwrap(), "aGVsbG8=");
    }

    #[test]
    fn normalize_strips_data_url_prefix() {
        let payload = "data:image/png;base64,aGVsbG8=";
        assert_eq!(normalize_image_payload(payload).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn normalize_rejects_invalid_base64() {
        assert!(matches!(
            normalize_image_payload("not base64!!"),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn normalize_rejects_data_url_without_marker() {
        assert!(matches!(
            normalize_image_payload("data:image/png;hex,ff00"),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn normalize_rejects_empty_payloads() {
        assert!(matches!(
            normalize_image_payload(""),
            Err(TransportError::MalformedResponse(_))
        ));
    }
}
