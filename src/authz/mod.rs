//! Authorization module
//!
//! Policy checks of the form (subject, action, resource type), answered by
//! Pangea AuthZ. Each check is independent and idempotent, so callers may
//! issue them concurrently.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub mod pangea;

/// Action used when asking whether a principal may see a document category
pub const READ_ACTION: &str = "read";

/// Subject type for interactive users
pub const USER_SUBJECT: &str = "user";

/// Authorization errors
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Authorization request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthzRequest {
    pub subject_type: String,
    pub subject: String,
    pub action: String,
    pub resource_type: String,
    pub context: HashMap<String, serde_json::Value>,
}

impl AuthzRequest {
    /// "May `user` read resources of type `resource_type`?"
    pub fn read(user: &str, resource_type: &str) -> Self {
        Self {
            subject_type: USER_SUBJECT.into(),
            subject: user.into(),
            action: READ_ACTION.into(),
            resource_type: resource_type.into(),
            context: HashMap::new(),
        }
    }
}

/// Authorizer trait
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Check if the request is authorized.
    ///
    /// `Ok(false)` is a denial. `Err` means no decision was reached and must
    /// not be read as either allow or deny.
    async fn authorize(&self, request: &AuthzRequest) -> Result<bool, AuthzError>;
}

#[async_trait]
impl<A: Authorizer + ?Sized> Authorizer for std::sync::Arc<A> {
    async fn authorize(&self, request: &AuthzRequest) -> Result<bool, AuthzError> {
        (**self).authorize(request).await
    }
}

/// No-op authorizer that always allows
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn authorize(&self, _request: &AuthzRequest) -> Result<bool, AuthzError> {
        Ok(true)
    }
}

/// No-op authorizer that always denies
pub struct DenyAllAuthorizer;

#[async_trait]
impl Authorizer for DenyAllAuthorizer {
    async fn authorize(&self, _request: &AuthzRequest) -> Result<bool, AuthzError> {
        Ok(false)
    }
}
