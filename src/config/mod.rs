//! Configuration module for authz-rag
//!
//! All settings come from the process environment, optionally seeded from a
//! `.env` file (see [`load_dotenv`]). The three Pangea
//! credentials and the OpenAI key are required; everything else has a
//! documented default. Missing values are reported before any network or
//! listener activity happens.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// AuthN client token used for the code exchange and token check
pub const ENV_AUTHN_CLIENT_TOKEN: &str = "PANGEA_AUTHN_CLIENT_TOKEN";
/// Hosted login page the browser is sent to
pub const ENV_AUTHN_HOSTED_LOGIN: &str = "PANGEA_AUTHN_HOSTED_LOGIN";
/// AuthZ service token used for policy checks
pub const ENV_AUTHZ_TOKEN: &str = "PANGEA_AUTHZ_TOKEN";
/// Optional service domain override
pub const ENV_DOMAIN: &str = "PANGEA_DOMAIN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_CALLBACK_ADDR: &str = "AUTHZ_RAG_CALLBACK_ADDR";
pub const ENV_LOGIN_TIMEOUT_SECS: &str = "AUTHZ_RAG_LOGIN_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "AUTHZ_RAG_DATA_DIR";
pub const ENV_TOP_K: &str = "AUTHZ_RAG_TOP_K";

/// Default Pangea domain when `PANGEA_DOMAIN` is unset
pub const DEFAULT_DOMAIN: &str = "aws.us.pangea.cloud";

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to read {path}: {reason}")]
    DotEnv { path: PathBuf, reason: String },
}

/// File read by [`load_dotenv`]
pub const DOTENV_FILE: &str = ".env";

/// Seed the process environment from `.env` in the working directory.
///
/// Variables already set in the environment are left alone. A missing file
/// is not an error; returns whether a file was loaded.
pub fn load_dotenv() -> Result<bool, ConfigError> {
    load_dotenv_from(DOTENV_FILE)
}

/// Seed the process environment from the given dotenv file
pub fn load_dotenv_from(path: impl AsRef<std::path::Path>) -> Result<bool, ConfigError> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(ConfigError::DotEnv {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// A credential that never shows up in `Debug` output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub pangea: PangeaConfig,
    pub openai: OpenAiConfig,
    pub login: LoginConfig,
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::load(|key| std::env::var(key).ok())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.pangea.hosted_login_url) {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with http:// or https://",
                ENV_AUTHN_HOSTED_LOGIN
            )));
        }

        if self.pangea.domain.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Pangea domain cannot be empty".into(),
            ));
        }

        if !is_valid_http_url(&self.openai.base_url) {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with http:// or https://",
                ENV_OPENAI_BASE_URL
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "top_k must be greater than zero".into(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }

        if self.retrieval.max_concurrent_checks == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_checks must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Pangea AuthN/AuthZ configuration
#[derive(Debug, Clone)]
pub struct PangeaConfig {
    pub authn_client_token: Secret,
    pub hosted_login_url: String,
    pub authz_token: Secret,
    pub domain: String,
}

impl PangeaConfig {
    /// Base URL of a Pangea service, e.g. `https://authn.aws.us.pangea.cloud`
    pub fn service_url(&self, service: &str) -> String {
        format!("https://{}.{}", service, self.domain)
    }
}

/// OpenAI configuration for embeddings and chat completions
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Secret,
    pub base_url: String,
    pub embedding_model: String,
}

/// Local callback listener configuration
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Address the callback listener binds to
    pub callback_address: String,
    /// Host placed in `redirect_uri`; the port comes from the bound listener
    pub redirect_host: String,
    /// Optional upper bound on the wait for the browser callback
    pub timeout: Option<Duration>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            callback_address: default_callback_address(),
            redirect_host: default_redirect_host(),
            timeout: None,
        }
    }
}

fn default_callback_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_redirect_host() -> String {
    "localhost".to_string()
}

/// Ingestion and retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub data_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_concurrent_checks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_top_k() -> usize {
    4
}

fn default_chunk_size() -> usize {
    3500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_concurrent_checks() -> usize {
    8
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            pangea: PangeaConfig {
                authn_client_token: Secret::new("pcl_test"),
                hosted_login_url: "https://pdn-test.login.aws.us.pangea.cloud/authorize".into(),
                authz_token: Secret::new("pts_test"),
                domain: DEFAULT_DOMAIN.into(),
            },
            openai: OpenAiConfig {
                api_key: Secret::new("sk-test"),
                base_url: default_openai_base_url(),
                embedding_model: default_embedding_model(),
            },
            login: LoginConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    #[test]
    fn test_default_retrieval_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 4);
        assert_eq!(config.chunk_size, 3500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_service_url() {
        let config = test_config();
        assert_eq!(
            config.pangea.service_url("authz"),
            "https://authz.aws.us.pangea.cloud"
        );
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("pcl_very_secret");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(secret.expose(), "pcl_very_secret");
    }

    #[test]
    fn test_validation_rejects_non_http_login_url() {
        let mut config = test_config();
        config.pangea.hosted_login_url = "ftp://login".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_overlap_not_smaller_than_chunk() {
        let mut config = test_config();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }
}
