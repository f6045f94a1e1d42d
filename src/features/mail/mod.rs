//! # Mail Feature
//!
//! Outbound email through a transactional mail HTTP API.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

/// Sends an email-like message and reports the provider's delivery id
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Notifier backed by a JSON mail endpoint (Resend/Mailgun style)
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        HttpMailer {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail API returned {status}: {detail}"));
        }

        let accepted: SendResponse = response
            .json()
            .await
            .context("mail API returned an unreadable response")?;

        debug!("Mail accepted for {to}, delivery id: {}", accepted.id);
        Ok(accepted.id)
    }
}
