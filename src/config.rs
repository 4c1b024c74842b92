use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub email: EmailConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    pub default_model: String,
    pub writer_model: String,
    pub max_tokens: u32,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub tavily_api_key: String,
    pub serpapi_key: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    pub evidence_content_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub postmark_token: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub stage_timeout_secs: u64,
    pub message_chunk_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Health endpoint port; disabled when unset
    pub health_port: Option<u16>,
    pub host: String,
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let bot_token = var("TELEGRAM_TOKEN")
            .ok_or_else(|| anyhow!("TELEGRAM_TOKEN missing in environment"))?;

        let provider_id = or("LLM_PROVIDER", "google");
        let provider = LLMProvider::from_id(&provider_id)
            .ok_or_else(|| anyhow!("Unsupported LLM_PROVIDER: {}", provider_id))?;
        let key_var = match provider {
            LLMProvider::Google => "GOOGLE_API_KEY",
            LLMProvider::OpenAI => "OPENAI_API_KEY",
            LLMProvider::OpenRouter => "OPENROUTER_API_KEY",
            LLMProvider::Groq => "GROQ_API_KEY",
        };
        let api_key = match var(key_var) {
            Some(key) => key,
            None => bail!("{} must be set for LLM_PROVIDER={}", key_var, provider),
        };

        let health_port = match var("HEALTH_PORT") {
            Some(port) => Some(port.parse().context("HEALTH_PORT must be a port number")?),
            None => None,
        };

        Ok(Self {
            telegram: TelegramConfig {
                bot_token,
                api_base: or("TELEGRAM_API_BASE", "https://api.telegram.org"),
                poll_timeout_secs: or("TELEGRAM_POLL_TIMEOUT_SECS", "30")
                    .parse()
                    .context("TELEGRAM_POLL_TIMEOUT_SECS")?,
            },
            llm: LLMConfig {
                provider,
                api_key,
                default_model: or("LLM_MODEL", "gemini-2.5-flash"),
                writer_model: or("LLM_WRITER_MODEL", "gemini-2.5-pro"),
                max_tokens: or("LLM_MAX_TOKENS", "8192").parse().context("LLM_MAX_TOKENS")?,
                history_limit: or("REASONING_HISTORY_LIMIT", "16")
                    .parse()
                    .context("REASONING_HISTORY_LIMIT")?,
            },
            search: SearchConfig {
                tavily_api_key: var("TAVILY_API_KEY").unwrap_or_default(),
                serpapi_key: var("SERP_API_KEY").unwrap_or_default(),
                max_results: or("SEARCH_MAX_RESULTS", "5")
                    .parse()
                    .context("SEARCH_MAX_RESULTS")?,
                timeout_secs: or("SEARCH_TIMEOUT_SECS", "30")
                    .parse()
                    .context("SEARCH_TIMEOUT_SECS")?,
                evidence_content_chars: or("EVIDENCE_CONTENT_CHARS", "4000")
                    .parse()
                    .context("EVIDENCE_CONTENT_CHARS")?,
            },
            email: EmailConfig {
                postmark_token: var("POSTMARK_TOKEN").unwrap_or_default(),
                from_address: or("MAIL_FROM", "reports@deep-search.local"),
            },
            pipeline: PipelineConfig {
                stage_timeout_secs: or("STAGE_TIMEOUT_SECS", "300")
                    .parse()
                    .context("STAGE_TIMEOUT_SECS")?,
                message_chunk_limit: or("MESSAGE_CHUNK_LIMIT", "4096")
                    .parse()
                    .context("MESSAGE_CHUNK_LIMIT")?,
            },
            server: ServerConfig {
                health_port,
                host: or("HOST", "0.0.0.0"),
            },
        })
    }

    /// Credentials that are optional at startup but disable a feature when absent.
    pub fn missing_optional_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.search.tavily_api_key.is_empty() {
            missing.push("TAVILY_API_KEY");
        }
        if self.search.serpapi_key.is_empty() {
            missing.push("SERP_API_KEY");
        }
        if self.email.postmark_token.is_empty() {
            missing.push("POSTMARK_TOKEN");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_telegram_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "g")])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_TOKEN"));
    }

    #[test]
    fn test_missing_llm_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("LLM_PROVIDER", "openai"),
            ("GOOGLE_API_KEY", "g"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_unknown_provider_is_fatal() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("LLM_PROVIDER", "glm"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("glm"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("GOOGLE_API_KEY", "g"),
        ]))
        .unwrap();
        assert_eq!(config.llm.provider, LLMProvider::Google);
        assert_eq!(config.llm.default_model, "gemini-2.5-flash");
        assert_eq!(config.llm.writer_model, "gemini-2.5-pro");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.pipeline.message_chunk_limit, 4096);
        assert_eq!(config.pipeline.stage_timeout(), Duration::from_secs(300));
        assert!(config.server.health_port.is_none());
        assert_eq!(
            config.missing_optional_keys(),
            vec!["TAVILY_API_KEY", "SERP_API_KEY", "POSTMARK_TOKEN"]
        );
    }

    #[test]
    fn test_blank_values_are_treated_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("GOOGLE_API_KEY", "g"),
            ("LLM_MODEL", "  "),
            ("HEALTH_PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.llm.default_model, "gemini-2.5-flash");
        assert_eq!(config.server.health_port, Some(8080));
    }

    #[test]
    fn test_bad_number_is_error() {
        let result = Config::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "t"),
            ("GOOGLE_API_KEY", "g"),
            ("STAGE_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }
}
