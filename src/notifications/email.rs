use async_trait::async_trait;
use serde_json::json;

use crate::config::EmailConfig;
use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email. `send` resolves to `false` when delivery is switched off.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<bool, ServiceError>;
}

/// Email over a JSON HTTP API (`Authorization: Bearer <EMAIL_API_KEY>`).
pub struct HttpEmailSender {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    from: String,
}

impl HttpEmailSender {
    pub fn new(settings: &EmailConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key: settings.api_key.clone(),
            api_url: settings.api_url.clone(),
            from: settings.from.clone(),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<bool, ServiceError> {
        let Some(api_key) = &self.api_key else {
            tracing::warn!(to = %message.to, subject = %message.subject, "Email not configured, skipping send");
            return Ok(false);
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
                "text": message.text,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::dependency("email", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::dependency("email", format!("{}: {}", status, body)));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(true)
    }
}
