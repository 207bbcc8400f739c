use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Email, Notifier, NotifyError};
use crate::config::MailConfig;

/// Posts each email as JSON to an HTTP mail relay.
pub struct RelayMailer {
    client: Client,
    url: String,
    token: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl RelayMailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(RelayMailer {
            client,
            url: config.relay_url.clone(),
            token: config.relay_token.clone(),
            from: config.from_header(),
        })
    }
}

#[async_trait]
impl Notifier for RelayMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let message = RelayMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
