//! # Configuration Module
//!
//! This module defines the process configuration read from the environment
//! and the recovery settings used to guard calls to the commerce backend.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

// Constants for bot configuration
pub const DEFAULT_MOLTIN_API_URL: &str = "https://api.moltin.com";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_RESTART_DELAY_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Recovery configuration for commerce backend failures
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Timeout for a single commerce API request in seconds
    pub request_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Credentials and location of the commerce API
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Where forwarded log records go
#[derive(Debug, Clone)]
pub struct LogForwardConfig {
    /// Token of the bot that posts log records, may equal the shop bot token
    pub bot_token: String,
    /// Operator chat receiving the records
    pub chat_id: i64,
}

/// Configuration structure for the whole process
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram token of the shop bot
    pub bot_token: String,
    /// Redis connection URL for conversation state and token cache
    pub redis_url: String,
    pub commerce: CommerceConfig,
    /// Log forwarding, disabled when no operator chat is configured
    pub log_forward: Option<LogForwardConfig>,
    /// Delay before the receive loop is restarted after a crash
    pub restart_delay: Duration,
    /// Emit JSON log lines instead of the human readable format
    pub json_logs: bool,
    pub recovery: RecoveryConfig,
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let bot_token = required("TG_BOT_TOKEN")?;

        let commerce = CommerceConfig {
            api_url: lookup("MOLTIN_API_URL")
                .unwrap_or_else(|| DEFAULT_MOLTIN_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client_id: required("MOLTIN_CLIENT_ID")?,
            client_secret: required("MOLTIN_CLIENT_SECRET")?,
        };

        let log_forward = match lookup("TG_LOG_CHAT_ID") {
            Some(raw) => {
                let chat_id = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("TG_LOG_CHAT_ID is not a chat id: {raw}"))?;
                Some(LogForwardConfig {
                    bot_token: lookup("TG_LOGGING_BOT_TOKEN").unwrap_or_else(|| bot_token.clone()),
                    chat_id,
                })
            }
            None => None,
        };

        let restart_delay_secs = match lookup("RESTART_DELAY_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("RESTART_DELAY_SECS is not a number: {raw}"))?,
            None => DEFAULT_RESTART_DELAY_SECS,
        };

        Ok(Self {
            bot_token,
            redis_url: redis_url(&lookup),
            commerce,
            log_forward,
            restart_delay: Duration::from_secs(restart_delay_secs),
            json_logs: lookup("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json")),
            recovery: RecoveryConfig::default(),
        })
    }
}

/// `REDIS_URL` wins; otherwise the URL is assembled from host, port and password
fn redis_url<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("REDIS_URL") {
        return url;
    }

    match lookup("REDIS_HOST") {
        Some(host) => {
            let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
            match lookup("REDIS_PASSWORD") {
                Some(password) => format!("redis://:{password}@{host}:{port}"),
                None => format!("redis://{host}:{port}"),
            }
        }
        None => DEFAULT_REDIS_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("TG_BOT_TOKEN", "123:abc"),
        ("MOLTIN_CLIENT_ID", "client"),
        ("MOLTIN_CLIENT_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_lookup(lookup_from(REQUIRED)).unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.commerce.api_url, DEFAULT_MOLTIN_API_URL);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.restart_delay, Duration::from_secs(10));
        assert!(config.log_forward.is_none());
        assert!(!config.json_logs);
    }

    #[test]
    fn test_missing_required_variable() {
        let err = BotConfig::from_lookup(lookup_from(&[("TG_BOT_TOKEN", "123:abc")])).unwrap_err();
        assert!(err.to_string().contains("MOLTIN_CLIENT_ID"));
    }

    #[test]
    fn test_redis_url_from_parts() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("REDIS_HOST", "cache.local"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "hunter2"),
        ]);
        let config = BotConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.redis_url, "redis://:hunter2@cache.local:6380");
    }

    #[test]
    fn test_log_forwarding_defaults_to_shop_token() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TG_LOG_CHAT_ID", "-10042"));
        let config = BotConfig::from_lookup(lookup_from(&vars)).unwrap();

        let forward = config.log_forward.unwrap();
        assert_eq!(forward.chat_id, -10042);
        assert_eq!(forward.bot_token, "123:abc");
    }

    #[test]
    fn test_invalid_log_chat_id() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TG_LOG_CHAT_ID", "operators"));
        assert!(BotConfig::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("MOLTIN_API_URL", "https://example.test/"));
        let config = BotConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.commerce.api_url, "https://example.test");
    }
}
