//! Browser login flow
//!
//! [`LoginFlow::authenticate`] binds a local callback listener, sends the
//! browser to the hosted login page with a fresh anti-forgery nonce, and waits
//! until one callback completes the code exchange and token check. The
//! listener is released on every exit path, including when the returned
//! future is dropped.
//!
//! # Example
//!
//! ```no_run
//! use authz_rag::auth::PangeaIdentityClient;
//! use authz_rag::config::LoginConfig;
//! use authz_rag::login::LoginFlow;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = PangeaIdentityClient::new("https://authn.aws.us.pangea.cloud", "pcl_...")?;
//! let flow = LoginFlow::new(
//!     "https://pdn-xyz.login.aws.us.pangea.cloud/authorize",
//!     LoginConfig::default(),
//!     Arc::new(identity),
//! )?;
//! let principal = flow.authenticate().await?;
//! println!("Authenticated as {}", principal);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod callback;
pub mod server;
pub mod session;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use callback::{CallbackHandler, CallbackRejection};
pub use server::{CallbackListener, ListenerGuard, CALLBACK_PATH};
pub use session::{AuthSession, SessionStatus};

use crate::auth::{IdentityClient, Principal};
use crate::config::LoginConfig;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Login flow errors
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Invalid login URL: {0}")]
    InvalidLoginUrl(String),

    #[error("Failed to bind callback listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Login timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Callback listener stopped before a login completed")]
    ListenerClosed,
}

/// Coordinates one interactive login
pub struct LoginFlow {
    login_url: Url,
    config: LoginConfig,
    identity: Arc<dyn IdentityClient>,
    browser: Box<dyn BrowserLauncher>,
}

impl LoginFlow {
    /// Create a login flow for the hosted login page at `login_url`.
    ///
    /// The URL is checked here so a bad value fails before any listener is
    /// opened or browser launched.
    pub fn new(
        login_url: &str,
        config: LoginConfig,
        identity: Arc<dyn IdentityClient>,
    ) -> Result<Self, LoginError> {
        let login_url =
            Url::parse(login_url).map_err(|e| LoginError::InvalidLoginUrl(e.to_string()))?;
        if !matches!(login_url.scheme(), "http" | "https") {
            return Err(LoginError::InvalidLoginUrl(format!(
                "unsupported scheme '{}'",
                login_url.scheme()
            )));
        }

        Ok(Self {
            login_url,
            config,
            identity,
            browser: Box::new(SystemBrowser),
        })
    }

    /// Replace the browser launcher
    pub fn with_browser(mut self, browser: impl BrowserLauncher + 'static) -> Self {
        self.browser = Box::new(browser);
        self
    }

    /// Run the login with a freshly generated nonce
    pub async fn authenticate(&self) -> Result<Principal, LoginError> {
        self.authenticate_with(AuthSession::new()).await
    }

    /// Run the login for a given session
    pub async fn authenticate_with(&self, session: AuthSession) -> Result<Principal, LoginError> {
        let session = Arc::new(session);
        let listener = CallbackListener::bind(&self.config.callback_address)
            .await
            .map_err(|source| LoginError::Bind {
                address: self.config.callback_address.clone(),
                source,
            })?;

        let redirect_uri = format!(
            "http://{}:{}{}",
            self.config.redirect_host,
            listener.local_addr().port(),
            CALLBACK_PATH
        );
        let url = build_login_url(&self.login_url, &redirect_uri, session.nonce());

        let (handler, principal_rx) = CallbackHandler::new(session, Arc::clone(&self.identity));
        let guard = listener.serve(Arc::new(handler));

        info!("Opening browser to authenticate...");
        info!("URL: <{}>", url);
        if let Err(e) = self.browser.open(url.as_str()) {
            warn!("Could not open a browser ({}); open the URL above manually", e);
        }

        let received = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, principal_rx)
                .await
                .map_err(|_| LoginError::TimedOut(limit)),
            None => Ok(principal_rx.await),
        };
        guard.close().await;

        received?.map_err(|_| LoginError::ListenerClosed)
    }
}

/// Login URL with `redirect_uri`, `response_type=code` and `state` set.
///
/// Existing query parameters are kept unless they collide with these three,
/// which are replaced.
pub fn build_login_url(base: &Url, redirect_uri: &str, state: &str) -> Url {
    const OWNED: [&str; 3] = ["redirect_uri", "response_type", "state"];

    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| !OWNED.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(kept);
        pairs.append_pair("redirect_uri", redirect_uri);
        pairs.append_pair("response_type", "code");
        pairs.append_pair("state", state);
    }
    url
}
