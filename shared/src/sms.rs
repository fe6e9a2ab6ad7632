use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SmsConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmsError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("SMS gateway is not configured")]
    NotConfigured,

    #[error("Failed to reach SMS gateway: {0}")]
    Transport(String),

    #[error("SMS gateway rejected the message: {0}")]
    Rejected(String),
}

/// Acknowledgement from the gateway for one accepted message
#[derive(Debug, Clone, PartialEq)]
pub struct SmsReceipt {
    pub message_id: Option<String>,
}

/// Outbound SMS capability
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Sends one message to an already normalized phone number
    async fn send_sms(&self, to: &str, text: &str) -> Result<SmsReceipt, SmsError>;
}

/// Normalizes a phone number to international `+<digits>` form.
///
/// Numbers in national format (single leading `0`) get `default_country_code`.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Result<String, SmsError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{}{}", default_country_code.trim_start_matches('+'), rest)
    } else {
        cleaned
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SmsError::InvalidPhone(raw.to_string()));
    }
    if digits.len() < 8 || digits.len() > 15 {
        return Err(SmsError::InvalidPhone(raw.to_string()));
    }

    Ok(format!("+{}", digits))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMessage<'a> {
    pub to: &'a str,
    pub sender: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// SMS sender backed by the HTTP gateway
pub struct HttpSmsSender {
    client: Client,
    config: SmsConfig,
}

impl HttpSmsSender {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(SmsConfig::from_env())
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send_sms(&self, to: &str, text: &str) -> Result<SmsReceipt, SmsError> {
        if self.config.dry_run {
            debug!("Test mode: skipping SMS to {} ({} chars)", to, text.len());
            return Ok(SmsReceipt { message_id: None });
        }

        if self.config.gateway_url.is_empty() {
            return Err(SmsError::NotConfigured);
        }

        let message = GatewayMessage {
            to,
            sender: &self.config.sender_name,
            text,
        };

        let response = self
            .client
            .post(&self.config.gateway_url)
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send SMS to {}: {}", to, e);
                SmsError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "SMS gateway returned error status {}: {}",
                status, error_text
            );
            return Err(SmsError::Rejected(format!("{} - {}", status, error_text)));
        }

        let body: GatewayResponse = response.json().await.map_err(|e| {
            error!("Failed to parse SMS gateway response: {}", e);
            SmsError::Transport(format!("Failed to parse gateway response: {}", e))
        })?;

        if body.status != "ok" {
            let reason = body.message.unwrap_or_else(|| body.status.clone());
            error!("SMS to {} rejected by gateway: {}", to, reason);
            return Err(SmsError::Rejected(reason));
        }

        info!("SMS accepted by gateway for {}", to);
        Ok(SmsReceipt {
            message_id: body.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: String) -> SmsConfig {
        SmsConfig {
            gateway_url: url,
            api_key: "key-123".into(),
            sender_name: "EventDesk".into(),
            dry_run: false,
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("054-123-4567", "972").unwrap(), "+972541234567");
        assert_eq!(normalize_phone("+972 54 123 4567", "972").unwrap(), "+972541234567");
        assert_eq!(normalize_phone("00972541234567", "972").unwrap(), "+972541234567");
        assert_eq!(normalize_phone("(020) 7946.0018", "+44").unwrap(), "+442079460018");
        assert_eq!(normalize_phone("14155550123", "972").unwrap(), "+14155550123");

        assert!(normalize_phone("", "972").is_err());
        assert!(normalize_phone("054-12x-4567", "972").is_err());
        assert!(normalize_phone("+12345", "972").is_err());
        assert!(normalize_phone("+1234567890123456", "972").is_err());
    }

    #[tokio::test]
    async fn test_send_sms_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer key-123")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "to": "+972541234567",
                "sender": "EventDesk",
                "text": "hello"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","messageId":"m-1"}"#)
            .create_async()
            .await;

        let sender = HttpSmsSender::new(config(format!("{}/send", server.url())));
        let receipt = sender.send_sms("+972541234567", "hello").await.unwrap();

        assert_eq!(receipt.message_id.as_deref(), Some("m-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_sms_gateway_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(200)
            .with_body(r#"{"status":"error","message":"blocked number"}"#)
            .create_async()
            .await;

        let sender = HttpSmsSender::new(config(format!("{}/send", server.url())));
        let err = sender.send_sms("+972541234567", "hello").await.unwrap_err();

        assert_eq!(err, SmsError::Rejected("blocked number".into()));
    }

    #[tokio::test]
    async fn test_send_sms_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let sender = HttpSmsSender::new(config(format!("{}/send", server.url())));
        let err = sender.send_sms("+972541234567", "hello").await.unwrap_err();

        assert!(matches!(err, SmsError::Rejected(msg) if msg.contains("maintenance")));
    }

    #[tokio::test]
    async fn test_send_sms_without_gateway() {
        let sender = HttpSmsSender::new(config(String::new()));
        let err = sender.send_sms("+972541234567", "hello").await.unwrap_err();
        assert_eq!(err, SmsError::NotConfigured);
    }
}
