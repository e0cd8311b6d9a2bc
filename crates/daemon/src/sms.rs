use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::config::GatewaySettings;

/// Seam for SMS dispatch so the check workflow can be tested with a fake.
/// `segments` is the already-split multipart message, in order.
pub trait SmsSender {
    async fn send(&self, phone: &str, segments: &[String]) -> Result<()>;
}

/// Production sender: posts the message to an HTTP SMS gateway as
/// `{"to": ..., "parts": [...]}` with bearer auth.
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build gateway HTTP client")?;
        Ok(Self {
            client,
            url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }
}

impl SmsSender for HttpGateway {
    async fn send(&self, phone: &str, segments: &[String]) -> Result<()> {
        if self.url.is_empty() {
            bail!("gateway.url is not configured; run `gitsms config --gateway-url <url>`");
        }

        let body = serde_json::json!({
            "to": phone,
            "parts": segments,
        });

        let mut req = self.client.post(&self.url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        debug!("POST {} ({} parts)", self.url, segments.len());
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("gateway returned HTTP {status}: {body}");
        }
        Ok(())
    }
}
