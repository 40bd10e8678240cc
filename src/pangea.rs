//! Minimal Pangea API transport
//!
//! Every Pangea service answers with the same envelope:
//!
//! ```json
//! { "request_id": "...", "status": "Success", "summary": "...", "result": { ... } }
//! ```
//!
//! Only `status == "Success"` counts as success. Anything else, including a
//! 2xx HTTP status carrying a non-success envelope, is an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default timeout for Pangea requests (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS: &str = "Success";

/// Transport-level errors talking to a Pangea service
#[derive(Error, Debug)]
pub enum PangeaError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Pangea returned HTTP {http_status}: {status}: {summary}")]
    Status {
        http_status: u16,
        status: String,
        summary: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Response envelope shared by all Pangea services
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub request_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub summary: String,
    pub result: Option<T>,
}

/// Bearer-authenticated JSON client for one Pangea service
#[derive(Debug, Clone)]
pub struct PangeaClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PangeaClient {
    /// Create a client for `base_url` (e.g. `https://authz.aws.us.pangea.cloud`)
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, PangeaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PangeaError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `path` and return the envelope's `result`
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PangeaError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| PangeaError::Transport(e.to_string()))?;

        let http_status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PangeaError::Transport(e.to_string()))?;

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !http_status.is_success() => {
                return Err(PangeaError::Status {
                    http_status: http_status.as_u16(),
                    status: "Unknown".into(),
                    summary: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            Err(e) => return Err(PangeaError::Decode(e.to_string())),
        };

        if !http_status.is_success() || envelope.status != SUCCESS {
            return Err(PangeaError::Status {
                http_status: http_status.as_u16(),
                status: envelope.status,
                summary: envelope.summary,
            });
        }

        envelope
            .result
            .ok_or_else(|| PangeaError::Decode("missing result".into()))
    }
}
