// Delivery of authorization URLs to the user

mod browser;
mod prompt;
mod sources;
mod telegram;

pub use browser::{launcher_command, SystemBrowser, UrlOpener};
pub use prompt::{
    ask_required, default_prompter, notice, shared, Prompter, ReaderPrompter, SharedPrompter,
    TerminalPrompter,
};
pub use sources::{
    resolve_first, ConfigSource, HostEnv, PromptSetup, SavedConfig, HOST_BOT_TOKEN_VAR,
    HOST_CHAT_ID_VAR,
};
pub use telegram::{TelegramClient, TelegramConfig, TelegramStore};

use async_trait::async_trait;
use reqwest::Client;

use crate::auth::UrlDelivery;
use crate::config::Config;
use crate::error::{AuthError, Result};

/// Which channel carries the authorization URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Telegram when configured without asking, else browser, else Telegram with a prompt
    Auto,
    Browser,
    Telegram,
}

impl DeliveryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryPolicy::Auto => "auto",
            DeliveryPolicy::Browser => "browser",
            DeliveryPolicy::Telegram => "telegram",
        }
    }
}

/// Chooses a channel per `DeliveryPolicy` and dispatches the URL
pub struct ChannelSelector {
    policy: DeliveryPolicy,
    store: TelegramStore,
    host_env: HostEnv,
    prompter: SharedPrompter,
    telegram: TelegramClient,
    browser: Box<dyn UrlOpener>,
    host_label: String,
}

impl ChannelSelector {
    /// Selector with no host environment and the system browser
    pub fn new(
        policy: DeliveryPolicy,
        store: TelegramStore,
        telegram: TelegramClient,
        prompter: SharedPrompter,
    ) -> Self {
        Self {
            policy,
            store,
            host_env: HostEnv::default(),
            prompter,
            telegram,
            browser: Box::new(SystemBrowser),
            host_label: "this machine".to_string(),
        }
    }

    pub fn from_config(config: &Config, client: Client, prompter: SharedPrompter) -> Self {
        let host_label = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "this machine".to_string());

        Self::new(
            config.delivery,
            TelegramStore::new(config.telegram_path()),
            TelegramClient::new(client, config.telegram_api_url.clone()),
            prompter,
        )
        .with_host_env(HostEnv::from_process_env())
        .with_host_label(host_label)
    }

    pub fn with_host_env(mut self, host_env: HostEnv) -> Self {
        self.host_env = host_env;
        self
    }

    pub fn with_browser(mut self, browser: Box<dyn UrlOpener>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_host_label(mut self, label: impl Into<String>) -> Self {
        self.host_label = label.into();
        self
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    fn message_text(&self, url: &str) -> String {
        format!(
            "Open this link to sign in to authctl from {}:\n{}",
            self.host_label, url
        )
    }

    /// Saved file, then host environment, then (if allowed) the prompt
    fn resolve_config(&self, allow_interactive: bool) -> Result<Option<TelegramConfig>> {
        let saved = SavedConfig::new(&self.store);
        let prompt = PromptSetup::new(&self.prompter, &self.store);
        resolve_first(&[&saved, &self.host_env, &prompt], allow_interactive)
    }

    async fn send_via_telegram(&self, config: &TelegramConfig, url: &str) -> Result<()> {
        self.telegram
            .send_message(config, &self.message_text(url))
            .await?;
        notice(&self.prompter, "Sign-in link sent via Telegram.")?;
        Ok(())
    }

    async fn deliver_with_prompt(&self, url: &str) -> Result<()> {
        let config = self
            .resolve_config(true)?
            .ok_or_else(|| AuthError::NotFound("Telegram configuration".to_string()))?;
        self.send_via_telegram(&config, url).await
    }
}

#[async_trait]
impl UrlDelivery for ChannelSelector {
    async fn deliver(&self, url: &str) -> Result<()> {
        notice(&self.prompter, &format!("Sign-in URL: {}", url))?;
        tracing::debug!(policy = self.policy.as_str(), "Delivering authorization URL");

        match self.policy {
            DeliveryPolicy::Browser => self.browser.open(url),
            DeliveryPolicy::Telegram => self.deliver_with_prompt(url).await,
            DeliveryPolicy::Auto => {
                if let Some(config) = self.resolve_config(false)? {
                    return self.send_via_telegram(&config, url).await;
                }
                match self.browser.open(url) {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Browser unavailable, falling back to Telegram");
                        self.deliver_with_prompt(url).await
                    }
                }
            }
        }
    }
}
