use crate::config::TelegramConfig;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Best-effort outbound notifications. Delivery failures are logged, never returned.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Used when no chat is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, message: &str) {
        debug!("Notification (not delivered): {}", message);
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramNotifier {
    base_url: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            base_url: format!("https://api.telegram.org/bot{}", config.bot_token),
            chat_id: config.chat_id.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
                parse_mode: "Markdown",
                disable_web_page_preview: true,
            })
            .send()
            .await
            .context("telegram request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("telegram returned {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => info!("Telegram notification sent"),
            Err(e) => warn!("Telegram notification failed: {:#}", e),
        }
    }
}

pub fn from_config(telegram: Option<&TelegramConfig>) -> Arc<dyn NotificationSink> {
    match telegram {
        Some(config) => Arc::new(TelegramNotifier::new(config)),
        None => {
            info!("Telegram not configured, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_payload_shape() {
        let payload = SendMessage {
            chat_id: "42",
            text: "*hello*",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "chat_id": "42",
                "text": "*hello*",
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_telegram_does_not_propagate() {
        let notifier = TelegramNotifier {
            base_url: "http://127.0.0.1:9".to_string(),
            chat_id: "1".to_string(),
            client: reqwest::Client::new(),
        };
        assert!(notifier.send("ping").await.is_err());
        // notify swallows the same failure
        notifier.notify("ping").await;
    }
}
