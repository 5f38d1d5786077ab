use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::request::DEFAULT_API_ROOT;
use crate::webhook::WebhookConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub webhook: Option<WebhookSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Override for tests or proxies; defaults to the public Bot API host.
    #[serde(default = "default_api_root")]
    pub api_root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookSection {
    pub public_url: String,
    pub listen_addr: String,
    #[serde(default)]
    pub certificate: Option<PathBuf>,
}

impl WebhookSection {
    pub fn to_webhook_config(&self) -> Result<WebhookConfig> {
        Ok(WebhookConfig {
            public_url: self.public_url.clone(),
            listen_addr: self
                .listen_addr
                .parse()
                .with_context(|| format!("invalid listen_addr: {}", self.listen_addr))?,
            certificate: self.certificate.clone(),
        })
    }
}

fn default_api_root() -> String {
    DEFAULT_API_ROOT.to_string()
}

fn default_period_ms() -> u64 {
    1000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.polling.period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.api_root, DEFAULT_API_ROOT);
        assert_eq!(config.poll_period(), Duration::from_millis(1000));
        assert!(config.webhook.is_none());
    }

    #[test]
    fn test_webhook_section_parsed() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            bot_token = "t"

            [polling]
            period_ms = 250

            [webhook]
            public_url = "https://bot.example.com/hook"
            listen_addr = "0.0.0.0:8443"
            certificate = "cert.pem"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_period(), Duration::from_millis(250));
        let webhook = config.webhook.unwrap().to_webhook_config().unwrap();
        assert_eq!(webhook.public_url, "https://bot.example.com/hook");
        assert_eq!(webhook.listen_addr.port(), 8443);
        assert_eq!(webhook.certificate, Some(PathBuf::from("cert.pem")));
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let section = WebhookSection {
            public_url: "https://x/".to_string(),
            listen_addr: "not-an-addr".to_string(),
            certificate: None,
        };
        assert!(section.to_webhook_config().is_err());
    }
}
