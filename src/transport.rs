use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::request::{HttpMethod, OutboundMessage};

/// One HTTP request/response exchange. A trait so the polling loop, the
/// dispatcher and the pipeline can run against a stub in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &OutboundMessage) -> Result<Vec<u8>>;
}

/// reqwest-backed transport. Any non-2xx status is a hard failure for that
/// call, carrying the raw response body for diagnostics; nothing is retried
/// at this layer.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &OutboundMessage) -> Result<Vec<u8>> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .header("Content-Type", request.content_type.clone())
                .body(request.body.clone()),
        };

        let response = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", redact_token(&request.url)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| {
                format!(
                    "failed to read response body from {}",
                    redact_token(&request.url)
                )
            })?;

        if !status.is_success() {
            bail!(
                "{} responded with status {}: {}",
                redact_token(&request.url),
                status,
                String::from_utf8_lossy(&body)
            );
        }
        Ok(body.to_vec())
    }
}

/// Request URLs carry the bot token in their `/bot{token}/` segment; strip it
/// before the URL can reach error text and logs.
fn redact_token(url: &str) -> String {
    let Some(start) = url.find("/bot") else {
        return url.to_string();
    };
    let rest = &url[start + 4..];
    match rest.find('/') {
        Some(end) => format!("{}/bot<redacted>{}", &url[..start], &rest[end..]),
        None => format!("{}/bot<redacted>", &url[..start]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_token_hides_credential() {
        let url = "https://api.telegram.org/bot123:SECRET/sendMessage";
        let redacted = redact_token(url);
        assert_eq!(
            redacted,
            "https://api.telegram.org/bot<redacted>/sendMessage"
        );
        assert!(!redacted.contains("SECRET"));
    }

    #[test]
    fn test_redact_token_keeps_query_parameters() {
        let url = "https://api.telegram.org/bot123:SECRET/getUpdates?offset=8";
        assert_eq!(
            redact_token(url),
            "https://api.telegram.org/bot<redacted>/getUpdates?offset=8"
        );
    }

    #[test]
    fn test_redact_token_passes_through_other_urls() {
        assert_eq!(redact_token("https://example.com/ping"), "https://example.com/ping");
    }
}
