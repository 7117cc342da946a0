use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::bedrock::DEFAULT_BEDROCK_MODEL;
use crate::llm_client::DEFAULT_ANTHROPIC_MODEL;
use crate::timing::{DEFAULT_CAPACITY, DEFAULT_FALLBACK};

/// Which hosted model API answers evaluation prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic { api_key: String, model: String },
    Bedrock { region: String, model_id: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub provider: ProviderKind,
    /// `None` keeps the response-time history in memory.
    pub response_times_path: Option<String>,
    pub response_times_cap: usize,
    pub default_response_time: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let provider = match or_default("MODEL_PROVIDER", "anthropic").to_ascii_lowercase().as_str() {
            "anthropic" => ProviderKind::Anthropic {
                api_key: require("ANTHROPIC_API_KEY")?,
                model: or_default("ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL),
            },
            "bedrock" => ProviderKind::Bedrock {
                region: or_default("AWS_REGION", "us-east-1"),
                model_id: or_default("BEDROCK_MODEL_ID", DEFAULT_BEDROCK_MODEL),
            },
            other => bail!("MODEL_PROVIDER must be 'anthropic' or 'bedrock', got '{other}'"),
        };

        Ok(Config {
            port: or_default("PORT", "3000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or_default("RUST_LOG", "info"),
            provider,
            response_times_path: lookup("RESPONSE_TIMES_PATH").filter(|p| !p.trim().is_empty()),
            response_times_cap: match lookup("RESPONSE_TIMES_CAP") {
                Some(raw) => raw
                    .parse::<usize>()
                    .context("RESPONSE_TIMES_CAP must be a positive integer")?,
                None => DEFAULT_CAPACITY,
            },
            default_response_time: match lookup("DEFAULT_RESPONSE_TIME_MS") {
                Some(raw) => Duration::from_millis(
                    raw.parse::<u64>()
                        .context("DEFAULT_RESPONSE_TIME_MS must be a number of milliseconds")?,
                ),
                None => DEFAULT_FALLBACK,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_anthropic_key() {
        let config = config_from(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.response_times_cap, 10);
        assert_eq!(config.default_response_time, Duration::from_secs(30));
        assert!(config.response_times_path.is_none());
        assert_eq!(
            config.provider,
            ProviderKind::Anthropic {
                api_key: "sk-test".to_string(),
                model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            }
        );
    }

    #[test]
    fn test_anthropic_requires_api_key() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_bedrock_needs_no_api_key() {
        let config = config_from(&[
            ("MODEL_PROVIDER", "Bedrock"),
            ("AWS_REGION", "eu-west-1"),
            ("RESPONSE_TIMES_PATH", "/tmp/times.json"),
        ])
        .unwrap();
        assert_eq!(
            config.provider,
            ProviderKind::Bedrock {
                region: "eu-west-1".to_string(),
                model_id: DEFAULT_BEDROCK_MODEL.to_string(),
            }
        );
        assert_eq!(config.response_times_path.as_deref(), Some("/tmp/times.json"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = config_from(&[("MODEL_PROVIDER", "openai")]).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = config_from(&[("ANTHROPIC_API_KEY", "k"), ("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
