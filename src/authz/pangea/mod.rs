//! Pangea AuthZ Authorization
//!
//! Asks Pangea AuthZ whether a subject may perform an action on a resource
//! type via `POST /v1/check`. Every call goes to the service; decisions are
//! not cached, so a revoked grant takes effect on the next check.
//!
//! # Example
//!
//! ```no_run
//! use authz_rag::authz::pangea::PangeaAuthorizer;
//! use std::time::Duration;
//!
//! let authorizer = PangeaAuthorizer::builder()
//!     .url("https://authz.aws.us.pangea.cloud")
//!     .token("pts_...")
//!     .timeout(Duration::from_secs(5))
//!     .build()
//!     .expect("valid config");
//! ```

use super::{Authorizer, AuthzError, AuthzRequest};
use crate::pangea::{PangeaClient, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

const CHECK_PATH: &str = "/v1/check";

/// Pangea AuthZ client configuration
#[derive(Debug, Clone)]
pub struct PangeaAuthzConfig {
    /// Service URL (e.g., "https://authz.aws.us.pangea.cloud")
    pub url: String,
    /// AuthZ service token
    pub token: String,
    /// Request timeout (default: 10 seconds)
    pub timeout: Option<Duration>,
}

/// Pangea AuthZ Authorizer
pub struct PangeaAuthorizer {
    client: PangeaClient,
}

/// Builder for PangeaAuthorizer
#[derive(Default)]
pub struct PangeaAuthorizerBuilder {
    url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    subject: Subject<'a>,
    action: &'a str,
    resource: Resource<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<&'a HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct Subject<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct Resource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

impl<'a> CheckRequest<'a> {
    fn from_request(request: &'a AuthzRequest) -> Self {
        Self {
            subject: Subject {
                kind: &request.subject_type,
                id: &request.subject,
            },
            action: &request.action,
            resource: Resource {
                kind: &request.resource_type,
            },
            attributes: (!request.context.is_empty()).then_some(&request.context),
        }
    }
}

/// Pangea AuthZ check result
#[derive(Debug, Deserialize)]
struct CheckResult {
    allowed: bool,
}

impl PangeaAuthorizerBuilder {
    /// Set the AuthZ service URL
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Set the AuthZ service token
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the PangeaAuthorizer
    pub fn build(self) -> Result<PangeaAuthorizer, AuthzError> {
        let url = self
            .url
            .ok_or_else(|| AuthzError::ConfigError("AuthZ URL is required".into()))?;
        let token = self
            .token
            .ok_or_else(|| AuthzError::ConfigError("AuthZ token is required".into()))?;

        PangeaAuthorizer::new(PangeaAuthzConfig {
            url,
            token,
            timeout: self.timeout,
        })
    }
}

impl PangeaAuthorizer {
    /// Create a new Pangea authorizer
    pub fn new(config: PangeaAuthzConfig) -> Result<Self, AuthzError> {
        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = PangeaClient::new(&config.url, &config.token, timeout)
            .map_err(|e| AuthzError::ConfigError(e.to_string()))?;

        Ok(Self { client })
    }

    /// Create a new builder for PangeaAuthorizer
    pub fn builder() -> PangeaAuthorizerBuilder {
        PangeaAuthorizerBuilder::default()
    }
}

#[async_trait]
impl Authorizer for PangeaAuthorizer {
    #[tracing::instrument(
        name = "authz.pangea",
        skip(self, request),
        fields(
            authz.action = %request.action,
            authz.resource_type = %request.resource_type,
        ),
        err
    )]
    async fn authorize(&self, request: &AuthzRequest) -> Result<bool, AuthzError> {
        let result: CheckResult = self
            .client
            .post(CHECK_PATH, &CheckRequest::from_request(request))
            .await
            .map_err(|e| AuthzError::BackendError(e.to_string()))?;

        info!(
            decision = %if result.allowed { "allow" } else { "deny" },
            "AuthZ decision"
        );

        Ok(result.allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_request_body() {
        let request = AuthzRequest::read("alice", "hr");
        let body = serde_json::to_value(CheckRequest::from_request(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "subject": { "type": "user", "id": "alice" },
                "action": "read",
                "resource": { "type": "hr" }
            })
        );
    }

    #[test]
    fn test_builder_pattern() {
        let authorizer = PangeaAuthorizer::builder()
            .url("https://authz.aws.us.pangea.cloud")
            .token("pts_test")
            .timeout(Duration::from_secs(5))
            .build();
        assert!(authorizer.is_ok());
    }

    #[test]
    fn test_builder_missing_url() {
        let result = PangeaAuthorizer::builder().token("pts_test").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_missing_token() {
        let result = PangeaAuthorizer::builder()
            .url("https://authz.aws.us.pangea.cloud")
            .build();
        assert!(result.is_err());
    }
}
