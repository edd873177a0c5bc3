//! Read-only configuration from environment variables.
//!
//! `policy.pool.member_friend` with prefix `METER_` maps to
//! `METER_POLICY__POOL__MEMBER_FRIEND`: key segments are joined with a
//! double underscore so single underscores inside a segment survive.

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

const SEGMENT_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        let body = key
            .split('.')
            .map(str::to_uppercase)
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR);
        match &self.prefix {
            Some(prefix) => format!("{prefix}{body}"),
            None => body,
        }
    }

    fn key_from_env(&self, env_name: &str) -> Option<String> {
        let body = match &self.prefix {
            Some(prefix) => env_name.strip_prefix(prefix.as_str())?,
            None => env_name,
        };
        Some(
            body.split(SEGMENT_SEPARATOR)
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    fn read_only() -> ConfigError {
        ConfigError::Provider {
            message: "Environment variables are read-only at runtime".into(),
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    async fn set_raw(&self, _key: &str, _value: &str) -> ConfigResult<()> {
        Err(Self::read_only())
    }

    async fn delete(&self, _key: &str) -> ConfigResult<bool> {
        Err(Self::read_only())
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let env_prefix = self.env_key(prefix.trim_end_matches('.'));
        Ok(std::env::vars()
            .filter(|(name, _)| name.starts_with(&env_prefix))
            .filter_map(|(name, _)| self.key_from_env(&name))
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_round_trip_keeps_underscores() {
        let provider = EnvConfigProvider::prefixed("METER_");
        assert_eq!(
            provider.env_key("policy.pool.member_friend"),
            "METER_POLICY__POOL__MEMBER_FRIEND"
        );
        assert_eq!(
            provider.key_from_env("METER_CREDIT__SKU__TTS_15M_499"),
            Some("credit.sku.tts_15m_499".to_string())
        );
        assert_eq!(provider.key_from_env("OTHER_VAR"), None);

        let bare = EnvConfigProvider::new();
        assert_eq!(bare.env_key("usage.window_days"), "USAGE__WINDOW_DAYS");
    }

    #[tokio::test]
    async fn test_env_provider_get_and_list() {
        let provider = EnvConfigProvider::prefixed("METER_ENV_TEST_");

        // SAFETY: test-only environment setup with a unique prefix
        unsafe { std::env::set_var("METER_ENV_TEST_CREDIT__SKU__PROMO_5M", "300") };
        assert_eq!(
            provider.get_raw("credit.sku.promo_5m").await.unwrap(),
            Some("300".to_string())
        );
        let keys = provider.list_keys("credit.sku.").await.unwrap();
        assert_eq!(keys, vec!["credit.sku.promo_5m".to_string()]);
        unsafe { std::env::remove_var("METER_ENV_TEST_CREDIT__SKU__PROMO_5M") };
    }

    #[tokio::test]
    async fn test_env_provider_read_only() {
        let provider = EnvConfigProvider::new();
        assert!(provider.set_raw("key", "value").await.is_err());
        assert!(provider.delete("key").await.is_err());
        assert_eq!(
            EnvConfigProvider::prefixed("METER_MISSING_")
                .get_raw("some.key")
                .await
                .unwrap(),
            None
        );
    }
}
