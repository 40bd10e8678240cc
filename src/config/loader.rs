//! Configuration loader reading from an environment lookup

use super::*;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Build and validate a configuration from a variable lookup.
    ///
    /// Empty values count as unset. Required variables are checked in a fixed
    /// order so the first missing one is always the one reported.
    pub fn load<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let authn_client_token = Secret::new(require(ENV_AUTHN_CLIENT_TOKEN)?);
        let hosted_login_url = require(ENV_AUTHN_HOSTED_LOGIN)?;
        let authz_token = Secret::new(require(ENV_AUTHZ_TOKEN)?);
        let api_key = Secret::new(require(ENV_OPENAI_API_KEY)?);

        let mut login = LoginConfig::default();
        if let Some(addr) = get(ENV_CALLBACK_ADDR) {
            login.callback_address = addr;
        }
        if let Some(secs) = get(ENV_LOGIN_TIMEOUT_SECS) {
            let secs = Self::parse_number::<u64>(ENV_LOGIN_TIMEOUT_SECS, &secs)?;
            login.timeout = Some(Duration::from_secs(secs));
        }

        let mut retrieval = RetrievalConfig::default();
        if let Some(dir) = get(ENV_DATA_DIR) {
            retrieval.data_dir = PathBuf::from(dir);
        }
        if let Some(k) = get(ENV_TOP_K) {
            retrieval.top_k = Self::parse_number(ENV_TOP_K, &k)?;
        }

        let config = Config {
            pangea: PangeaConfig {
                authn_client_token,
                hosted_login_url,
                authz_token,
                domain: get(ENV_DOMAIN).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            },
            openai: OpenAiConfig {
                api_key,
                base_url: get(ENV_OPENAI_BASE_URL).unwrap_or_else(default_openai_base_url),
                embedding_model: default_embedding_model(),
            },
            login,
            retrieval,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_number<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, String> {
        HashMap::from([
            (ENV_AUTHN_CLIENT_TOKEN, "pcl_abc".to_string()),
            (
                ENV_AUTHN_HOSTED_LOGIN,
                "https://pdn-abc.login.aws.us.pangea.cloud/authorize".to_string(),
            ),
            (ENV_AUTHZ_TOKEN, "pts_abc".to_string()),
            (ENV_OPENAI_API_KEY, "sk-abc".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        ConfigLoader::load(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_load_with_defaults() {
        let config = load(&required()).unwrap();
        assert_eq!(config.pangea.domain, DEFAULT_DOMAIN);
        assert_eq!(config.login.callback_address, "127.0.0.1:3000");
        assert_eq!(config.login.timeout, None);
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_each_required_variable_is_fatal() {
        for var in [
            ENV_AUTHN_CLIENT_TOKEN,
            ENV_AUTHN_HOSTED_LOGIN,
            ENV_AUTHZ_TOKEN,
            ENV_OPENAI_API_KEY,
        ] {
            let mut vars = required();
            vars.remove(var);
            assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(var));
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = required();
        vars.insert(ENV_AUTHZ_TOKEN, "  ".to_string());
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing(ENV_AUTHZ_TOKEN)
        );
    }

    #[test]
    fn test_first_missing_variable_is_reported() {
        let vars = HashMap::new();
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing(ENV_AUTHN_CLIENT_TOKEN)
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.insert(ENV_DOMAIN, "gcp.eu.pangea.cloud".to_string());
        vars.insert(ENV_LOGIN_TIMEOUT_SECS, "120".to_string());
        vars.insert(ENV_TOP_K, "6".to_string());
        vars.insert(ENV_DATA_DIR, "docs".to_string());

        let config = load(&vars).unwrap();
        assert_eq!(config.pangea.domain, "gcp.eu.pangea.cloud");
        assert_eq!(config.login.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.data_dir, PathBuf::from("docs"));
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = required();
        vars.insert(ENV_TOP_K, "many".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { var: ENV_TOP_K, .. })
        ));
    }
}
