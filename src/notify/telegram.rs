// Telegram bot channel: persisted configuration and the sendMessage call

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::write_private_file;
use crate::error::{AuthError, Result};

/// Bot credentials and destination chat
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// `telegram.json` in the config directory
#[derive(Debug, Clone)]
pub struct TelegramStore {
    path: PathBuf,
}

impl TelegramStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<TelegramConfig> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotFound("Telegram configuration".to_string()));
            }
            Err(e) => return Err(AuthError::io(&self.path, e)),
        };

        let config: TelegramConfig = serde_json::from_slice(&data)
            .map_err(|e| AuthError::invalid("telegram configuration", e))?;
        if !config.is_complete() {
            return Err(AuthError::invalid(
                "telegram configuration",
                "missing bot_token or chat_id",
            ));
        }
        Ok(config)
    }

    pub fn save(&self, config: &TelegramConfig) -> Result<()> {
        if !config.is_complete() {
            return Err(AuthError::MissingFields(
                "Telegram configuration needs bot_token and chat_id".to_string(),
            ));
        }
        let data = serde_json::to_vec_pretty(config)
            .map_err(|e| AuthError::invalid("telegram configuration", e))?;
        write_private_file(&self.path, &data)?;
        tracing::info!(path = %self.path.display(), "Saved Telegram configuration");
        Ok(())
    }

    /// Forget the saved configuration; returns whether one existed
    pub fn reset(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::io(&self.path, e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Minimal Bot API client
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/bot<token>/sendMessage` with the token encoded as one path segment
    fn send_message_url(&self, bot_token: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AuthError::invalid("Telegram API URL", e))?;
        url.path_segments_mut()
            .map_err(|_| AuthError::invalid("Telegram API URL", "cannot carry a path"))?
            .pop_if_empty()
            .push(&format!("bot{}", bot_token))
            .push("sendMessage");
        Ok(url)
    }

    /// Send `text` to the configured chat; one request, no retries
    pub async fn send_message(&self, config: &TelegramConfig, text: &str) -> Result<()> {
        // The bot token is part of the path, so the URL itself is never logged
        let url = self.send_message_url(&config.bot_token)?;
        tracing::debug!(chat_id = %config.chat_id, "Sending Telegram message");

        let response = self
            .client
            .post(url)
            .form(&[
                ("chat_id", config.chat_id.as_str()),
                ("text", text),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Http(e.without_url()))?;

        let parsed: SendMessageResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::ChannelApi(format!("unexpected response (HTTP {}): {}", status, e))
        })?;

        if !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| format!("request failed with HTTP {}", status));
            tracing::warn!(status = %status, description = %description, "Telegram rejected message");
            return Err(AuthError::ChannelApi(description));
        }

        tracing::info!(chat_id = %config.chat_id, "Telegram message sent");
        Ok(())
    }
}
