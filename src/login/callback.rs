//! Callback request handling
//!
//! Each inbound `GET /callback` is judged on its own. Only a request with the
//! right `state`, a non-empty `code`, a successful exchange and a confirmed
//! token resolves the waiting coordinator, and only the first such request
//! does so. Once the login has resolved or the listener has closed, every
//! further callback is refused before any identity call is made.

use super::session::{AuthSession, SessionStatus};
use crate::auth::{AuthError, IdentityClient, Principal};
use crate::metrics;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Why a callback request was turned away
#[derive(Error, Debug)]
pub enum CallbackRejection {
    #[error("state parameter does not match this login")]
    StateMismatch,

    #[error("code parameter is missing")]
    MissingCode,

    #[error("token rejected: {0}")]
    TokenInvalid(#[from] AuthError),

    #[error("login already completed")]
    LoginClosed,
}

impl CallbackRejection {
    /// Label used for the callback attempt counter
    pub fn metric_label(&self) -> &'static str {
        match self {
            CallbackRejection::StateMismatch => "state_mismatch",
            CallbackRejection::MissingCode => "missing_code",
            CallbackRejection::TokenInvalid(_) => "token_invalid",
            CallbackRejection::LoginClosed => "login_closed",
        }
    }
}

/// Shared state behind the callback endpoint
pub struct CallbackHandler {
    session: Arc<AuthSession>,
    identity: Arc<dyn IdentityClient>,
    resolver: Mutex<Option<oneshot::Sender<Principal>>>,
}

impl CallbackHandler {
    /// Create a handler and the receiver its first valid callback resolves
    pub fn new(
        session: Arc<AuthSession>,
        identity: Arc<dyn IdentityClient>,
    ) -> (Self, oneshot::Receiver<Principal>) {
        let (tx, rx) = oneshot::channel();
        let handler = Self {
            session,
            identity,
            resolver: Mutex::new(Some(tx)),
        };
        (handler, rx)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Handle the raw query string of one callback request
    pub async fn handle(&self, query: Option<&str>) -> Result<Principal, CallbackRejection> {
        let result = self.evaluate(query).await;
        match &result {
            Ok(_) => metrics::record_callback_attempt("accepted"),
            Err(rejection) => {
                self.session.advance(SessionStatus::Failed);
                metrics::record_callback_attempt(rejection.metric_label());
                warn!(reason = %rejection, "Rejected login callback");
            }
        }
        result
    }

    /// True once the principal has been handed over or the listener closed
    pub fn is_closed(&self) -> bool {
        self.session.status().is_terminal() || self.resolver.lock().is_none()
    }

    async fn evaluate(&self, query: Option<&str>) -> Result<Principal, CallbackRejection> {
        if self.is_closed() {
            return Err(CallbackRejection::LoginClosed);
        }

        let state = query_param(query, "state");
        if !state.is_some_and(|s| self.session.verify_state(&s)) {
            return Err(CallbackRejection::StateMismatch);
        }

        let code = query_param(query, "code")
            .filter(|c| !c.is_empty())
            .ok_or(CallbackRejection::MissingCode)?;

        self.session.advance(SessionStatus::CodeReceived);

        let active = self.identity.exchange_code(&code).await?;
        let info = self.identity.validate_token(&active.token).await?;
        let principal = Principal::new(info.owner);

        if !self.resolve(&principal) {
            return Err(CallbackRejection::LoginClosed);
        }
        Ok(principal)
    }

    /// Hand the principal to the waiting coordinator; false if another
    /// callback got there first
    fn resolve(&self, principal: &Principal) -> bool {
        let Some(tx) = self.resolver.lock().take() else {
            debug!("Login already resolved; ignoring additional valid callback");
            return false;
        };
        self.session.advance(SessionStatus::Validated);
        if tx.send(principal.clone()).is_err() {
            debug!("Coordinator stopped waiting before the login completed");
        } else {
            info!("Login callback validated");
        }
        true
    }
}

/// First value of `name` in a URL query string, percent-decoded
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| match pair.split_once('=') {
            Some((k, v)) => Some((k, v)),
            None if !pair.is_empty() => Some((pair, "")),
            None => None,
        })
        .find(|(k, _)| decode(k) == name)
        .map(|(_, v)| decode(v))
}

fn decode(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ActiveToken, TokenInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Identity client that accepts one code and reports a fixed owner
    struct FakeIdentity {
        code: &'static str,
        owner: &'static str,
        validate_ok: bool,
        exchanges: AtomicUsize,
        /// Holds each exchange until notified
        gate: Option<Arc<Notify>>,
    }

    impl FakeIdentity {
        fn new(code: &'static str, owner: &'static str) -> Self {
            Self {
                code,
                owner,
                validate_ok: true,
                exchanges: AtomicUsize::new(0),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl IdentityClient for FakeIdentity {
        async fn exchange_code(&self, code: &str) -> Result<ActiveToken, AuthError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if code == self.code {
                Ok(ActiveToken {
                    token: format!("token-for-{}", code),
                    expire: None,
                })
            } else {
                Err(AuthError::ExchangeFailed("unknown code".into()))
            }
        }

        async fn validate_token(&self, _token: &str) -> Result<TokenInfo, AuthError> {
            if self.validate_ok {
                Ok(TokenInfo {
                    owner: self.owner.into(),
                    identity: None,
                    expire: None,
                })
            } else {
                Err(AuthError::InvalidToken("inactive".into()))
            }
        }
    }

    fn handler(identity: FakeIdentity) -> (CallbackHandler, oneshot::Receiver<Principal>) {
        let session = Arc::new(AuthSession::with_nonce("abc123"));
        CallbackHandler::new(session, Arc::new(identity))
    }

    #[test]
    fn test_query_param() {
        let q = Some("code=XYZ&state=abc%20123&empty=&flag");
        assert_eq!(query_param(q, "code").as_deref(), Some("XYZ"));
        assert_eq!(query_param(q, "state").as_deref(), Some("abc 123"));
        assert_eq!(query_param(q, "empty").as_deref(), Some(""));
        assert_eq!(query_param(q, "flag").as_deref(), Some(""));
        assert_eq!(query_param(q, "missing"), None);
        assert_eq!(query_param(None, "code"), None);
    }

    #[tokio::test]
    async fn test_valid_callback_resolves() {
        let (handler, mut rx) = handler(FakeIdentity::new("XYZ", "alice"));

        let principal = handler.handle(Some("code=XYZ&state=abc123")).await.unwrap();

        assert_eq!(principal.id(), "alice");
        assert_eq!(rx.try_recv().unwrap(), Principal::new("alice"));
        assert_eq!(handler.session().status(), SessionStatus::Validated);
    }

    #[tokio::test]
    async fn test_state_mismatch_does_not_resolve() {
        let identity = FakeIdentity::new("XYZ", "alice");
        let (handler, mut rx) = handler(identity);

        let result = handler.handle(Some("code=XYZ&state=forged")).await;

        assert!(matches!(result, Err(CallbackRejection::StateMismatch)));
        assert!(rx.try_recv().is_err());
        assert_eq!(handler.session().status(), SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_state_is_mismatch() {
        let (handler, _rx) = handler(FakeIdentity::new("XYZ", "alice"));
        let result = handler.handle(Some("code=XYZ")).await;
        assert!(matches!(result, Err(CallbackRejection::StateMismatch)));
    }

    #[tokio::test]
    async fn test_missing_code_does_not_resolve() {
        let (handler, mut rx) = handler(FakeIdentity::new("XYZ", "alice"));

        for query in ["state=abc123", "state=abc123&code="] {
            let result = handler.handle(Some(query)).await;
            assert!(matches!(result, Err(CallbackRejection::MissingCode)));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forged_state_never_reaches_identity_service() {
        let identity = Arc::new(FakeIdentity::new("XYZ", "alice"));
        let session = Arc::new(AuthSession::with_nonce("abc123"));
        let (handler, _rx) = CallbackHandler::new(session, identity.clone());

        let _ = handler.handle(Some("code=XYZ&state=nope")).await;

        assert_eq!(identity.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_validation_does_not_resolve() {
        let mut identity = FakeIdentity::new("XYZ", "alice");
        identity.validate_ok = false;
        let (handler, mut rx) = handler(identity);

        let result = handler.handle(Some("code=XYZ&state=abc123")).await;

        assert!(matches!(result, Err(CallbackRejection::TokenInvalid(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejection_then_success() {
        let (handler, mut rx) = handler(FakeIdentity::new("XYZ", "alice"));

        assert!(handler.handle(Some("code=BAD&state=abc123")).await.is_err());
        assert!(handler.handle(Some("code=XYZ&state=abc123")).await.is_ok());

        assert_eq!(rx.try_recv().unwrap().id(), "alice");
    }

    #[tokio::test]
    async fn test_second_valid_callback_is_refused() {
        let identity = Arc::new(FakeIdentity::new("XYZ", "alice"));
        let session = Arc::new(AuthSession::with_nonce("abc123"));
        let (handler, mut rx) = CallbackHandler::new(session, identity.clone());

        handler.handle(Some("code=XYZ&state=abc123")).await.unwrap();
        let second = handler.handle(Some("code=XYZ&state=abc123")).await;

        assert!(matches!(second, Err(CallbackRejection::LoginClosed)));
        assert_eq!(identity.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().id(), "alice");
        assert_eq!(handler.session().status(), SessionStatus::Validated);
    }

    #[tokio::test]
    async fn test_closed_session_refuses_before_exchange() {
        let identity = Arc::new(FakeIdentity::new("XYZ", "alice"));
        let session = Arc::new(AuthSession::with_nonce("abc123"));
        let (handler, mut rx) = CallbackHandler::new(session, identity.clone());
        handler.session().advance(SessionStatus::Closed);

        let result = handler.handle(Some("code=XYZ&state=abc123")).await;

        assert!(matches!(result, Err(CallbackRejection::LoginClosed)));
        assert_eq!(identity.exchanges.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rejected_sibling_does_not_block_validation() {
        let gate = Arc::new(Notify::new());
        let mut identity = FakeIdentity::new("XYZ", "alice");
        identity.gate = Some(gate.clone());
        let (handler, mut rx) = handler(identity);
        let handler = Arc::new(handler);

        let in_flight = tokio::spawn({
            let handler = Arc::clone(&handler);
            async move { handler.handle(Some("code=XYZ&state=abc123")).await }
        });
        while handler.session().status() != SessionStatus::CodeReceived {
            tokio::task::yield_now().await;
        }

        assert!(handler.handle(Some("code=XYZ&state=forged")).await.is_err());
        assert_eq!(handler.session().status(), SessionStatus::Failed);

        gate.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap().id(), "alice");
        assert_eq!(rx.try_recv().unwrap().id(), "alice");
        assert_eq!(handler.session().status(), SessionStatus::Validated);
    }
}
