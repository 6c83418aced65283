use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo-0125";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("API key not found. Set OPENAI_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("threshold must be a finite value in [-1, 1], got {0}")]
    InvalidThreshold(f32),
}

/// Connection settings for the hosted generative model.
#[derive(Clone)]
pub struct FallbackConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl FallbackConfig {
    pub fn new(api_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// keep the key out of logs
impl fmt::Debug for FallbackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_key_is_rejected() {
        assert_eq!(FallbackConfig::new(None).unwrap_err(), ConfigError::MissingApiKey);
        assert_eq!(
            FallbackConfig::new(Some("   ".into())).unwrap_err(),
            ConfigError::MissingApiKey
        );
    }

    #[test]
    fn defaults_apply() {
        let cfg = FallbackConfig::new(Some("sk-test".into())).unwrap();
        assert_eq!(cfg.model, DEFAULT_CHAT_MODEL);
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn debug_output_hides_key() {
        let cfg = FallbackConfig::new(Some("sk-secret".into())).unwrap();
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }
}
