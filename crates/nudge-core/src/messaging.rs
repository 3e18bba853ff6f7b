//! Outbound chat messages.
//!
//! The dispatch engine only sees [`MessagingPort`]. [`TelegramMessenger`] is
//! the production adapter for the Telegram Bot API.

use crate::error::CoreError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Why a single send did not go through.
///
/// Mirrors what the Bot API reports: the HTTP status, its own `error_code`
/// and a human readable description. Network-level failures carry no status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendFailure {
    pub http_status: Option<u16>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

impl SendFailure {
    pub fn timeout() -> Self {
        Self {
            description: Some("request timed out".to_string()),
            ..Default::default()
        }
    }

    pub fn transport(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn http(status: u16, error_code: Option<i64>, description: Option<String>) -> Self {
        Self {
            http_status: Some(status),
            error_code,
            description,
        }
    }

    /// True when the recipient refuses messages (blocked the bot, account
    /// deactivated). Such a condition is expected to persist, unlike rate
    /// limits, timeouts or server errors.
    pub fn is_permanent(&self) -> bool {
        if self.http_status == Some(403) || self.error_code == Some(403) {
            return true;
        }
        self.description.as_deref().is_some_and(|d| {
            let d = d.to_lowercase();
            d.contains("forbidden") || d.contains("bot was blocked") || d.contains("user is deactivated")
        })
    }
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.http_status, self.error_code) {
            (Some(status), Some(code)) => write!(f, "HTTP {status} (code {code})")?,
            (Some(status), None) => write!(f, "HTTP {status}")?,
            (None, Some(code)) => write!(f, "code {code}")?,
            (None, None) => write!(f, "transport error")?,
        }
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// Sends plain-text messages to chat identifiers.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendFailure>;
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base_url: String,
    /// Whole-request timeout for one `sendMessage` call.
    pub timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct TelegramMessenger {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramMessenger {
    pub fn new(config: &TelegramConfig) -> Result<Self, CoreError> {
        let token = config.bot_token.trim();
        if token.is_empty() {
            return Err(CoreError::Config("telegram bot token is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| CoreError::Messaging(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: send_message_endpoint(&config.api_base_url, token),
        })
    }
}

fn send_message_endpoint(base_url: &str, token: &str) -> String {
    format!("{}/bot{}/sendMessage", base_url.trim_end_matches('/'), token)
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendFailure::timeout()
                } else {
                    // The URL contains the bot token.
                    SendFailure::transport(err.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body = response.json::<BotApiResponse>().await;

        match body {
            Ok(body) if body.ok && status.is_success() => {
                debug!(chat_id, "Message accepted");
                Ok(())
            }
            Ok(body) => Err(SendFailure::http(status.as_u16(), body.error_code, body.description)),
            Err(err) if err.is_timeout() => Err(SendFailure::timeout()),
            Err(_) => Err(SendFailure::http(
                status.as_u16(),
                None,
                Some("unreadable Bot API response".to_string()),
            )),
        }
    }
}
