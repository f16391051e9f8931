use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email API rejected message ({0}): {1}")]
    Rejected(StatusCode, String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Posts transactional email to the configured HTTP email API.
/// Without configuration every send is a logged no-op.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: Option<EmailConfig>,
}

impl Mailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn compose(&self, to: &str, subject: &str, text: &str) -> Option<OutboundEmail> {
        self.config.as_ref().map(|config| OutboundEmail {
            from: config.from.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text: text.to_string(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        let (Some(config), Some(email)) = (self.config.as_ref(), self.compose(to, subject, text))
        else {
            tracing::debug!(%to, %subject, "Email disabled, skipping send");
            return Ok(());
        };

        let response = self
            .client
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .json(&email)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(%to, %subject, "Email sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Rejected(status, body))
        }
    }

    /// Fire and forget. Failures are logged and never reach the caller.
    pub fn send_in_background(&self, to: String, subject: String, text: String) {
        if !self.is_enabled() {
            return;
        }
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &text).await {
                tracing::warn!(%to, "Failed to send email: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_is_a_no_op() {
        let mailer = Mailer::disabled();
        assert!(!mailer.is_enabled());
        assert!(mailer.compose("a@example.com", "Hi", "Body").is_none());
        mailer.send("a@example.com", "Hi", "Body").await.unwrap();
    }

    #[test]
    fn compose_uses_configured_sender() {
        let mailer = Mailer::new(Some(EmailConfig {
            api_url: "http://127.0.0.1:9/emails".to_string(),
            api_key: "key".to_string(),
            from: "team@expert-match.test".to_string(),
        }));
        let email = mailer.compose("org@example.com", "Proposal accepted", "Congrats").unwrap();
        assert_eq!(email.from, "team@expert-match.test");
        assert_eq!(email.to, vec!["org@example.com".to_string()]);
    }
}
