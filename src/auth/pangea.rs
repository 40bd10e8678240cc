//! Pangea AuthN identity client
//!
//! - `POST /v2/client/userinfo` exchanges a hosted-login code for tokens
//! - `POST /v2/client/token/check` confirms a token and reports its owner
//!
//! Both calls authenticate with the AuthN client token.

use super::{ActiveToken, AuthError, IdentityClient, TokenInfo};
use crate::pangea::{PangeaClient, PangeaError, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USERINFO_PATH: &str = "/v2/client/userinfo";
const TOKEN_CHECK_PATH: &str = "/v2/client/token/check";

#[derive(Debug, Serialize)]
struct UserinfoRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserinfoResult {
    active_token: Option<TokenFields>,
}

#[derive(Debug, Deserialize)]
struct TokenFields {
    token: Option<String>,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct TokenCheckRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenCheckResult {
    owner: Option<String>,
    #[serde(default)]
    identity: Option<String>,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
}

/// Pangea AuthN client
#[derive(Debug, Clone)]
pub struct PangeaIdentityClient {
    client: PangeaClient,
}

impl PangeaIdentityClient {
    /// Create a client for the AuthN service at `url`
    pub fn new(url: &str, client_token: &str) -> Result<Self, AuthError> {
        Self::with_timeout(url, client_token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: &str, client_token: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = PangeaClient::new(url, client_token, timeout)
            .map_err(|e| AuthError::BackendError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IdentityClient for PangeaIdentityClient {
    async fn exchange_code(&self, code: &str) -> Result<ActiveToken, AuthError> {
        let result: UserinfoResult = self
            .client
            .post(USERINFO_PATH, &UserinfoRequest { code })
            .await
            .map_err(|e| match e {
                PangeaError::Status { .. } => AuthError::ExchangeFailed(e.to_string()),
                other => AuthError::BackendError(other.to_string()),
            })?;

        let active = result
            .active_token
            .ok_or_else(|| AuthError::ExchangeFailed("response has no active_token".into()))?;
        let token = active
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::ExchangeFailed("active_token has no token".into()))?;

        debug!("Exchanged authorization code for an active token");
        Ok(ActiveToken {
            token,
            expire: active.expire,
        })
    }

    async fn validate_token(&self, token: &str) -> Result<TokenInfo, AuthError> {
        let result: TokenCheckResult = self
            .client
            .post(TOKEN_CHECK_PATH, &TokenCheckRequest { token })
            .await
            .map_err(|e| match e {
                PangeaError::Status { .. } => AuthError::InvalidToken(e.to_string()),
                other => AuthError::BackendError(other.to_string()),
            })?;

        let owner = result
            .owner
            .filter(|o| !o.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("token check returned no owner".into()))?;

        Ok(TokenInfo {
            owner,
            identity: result.identity,
            expire: result.expire,
        })
    }
}
