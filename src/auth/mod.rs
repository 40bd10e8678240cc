//! Authentication module
//!
//! Identity client used by the login flow: exchanges a hosted-login
//! authorization code for an active token, then independently confirms the
//! token and reports who owns it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod pangea;

pub use pangea::PangeaIdentityClient;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Verified identity of the user driving the query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Session token obtained from a code exchange
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveToken {
    pub token: String,
    pub expire: Option<DateTime<Utc>>,
}

impl fmt::Debug for ActiveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveToken")
            .field("token", &"***")
            .field("expire", &self.expire)
            .finish()
    }
}

/// Result of a successful token validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub owner: String,
    pub identity: Option<String>,
    pub expire: Option<DateTime<Utc>>,
}

/// Identity client trait
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchange an authorization code for an active session token
    async fn exchange_code(&self, code: &str) -> Result<ActiveToken, AuthError>;

    /// Confirm a token is active and return its owner
    async fn validate_token(&self, token: &str) -> Result<TokenInfo, AuthError>;
}

#[async_trait]
impl<C: IdentityClient + ?Sized> IdentityClient for std::sync::Arc<C> {
    async fn exchange_code(&self, code: &str) -> Result<ActiveToken, AuthError> {
        (**self).exchange_code(code).await
    }

    async fn validate_token(&self, token: &str) -> Result<TokenInfo, AuthError> {
        (**self).validate_token(token).await
    }
}
