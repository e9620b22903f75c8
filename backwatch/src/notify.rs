//! Delivery of report messages to a Discord-style webhook

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Body accepted by the webhook
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    username: &'a str,
    content: &'a str,
}

pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Post one message; non-success statuses are errors
    pub fn send(&self, username: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { username, content })
            .send()
            .context("Failed to reach webhook")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Webhook rejected message with status {}: {}",
                status,
                body.trim()
            ));
        }

        log::debug!("Delivered {} byte message to webhook", content.len());
        Ok(())
    }
}
