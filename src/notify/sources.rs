// Ordered resolution of the Telegram configuration:
// saved file -> host-injected environment -> interactive prompt

use super::prompt::{ask_required, notice, SharedPrompter};
use super::telegram::{TelegramConfig, TelegramStore};
use crate::error::{AuthError, Result};

/// Environment variable carrying a host-provided bot token
pub const HOST_BOT_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable carrying a host-provided chat id
pub const HOST_CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

/// One way of obtaining a Telegram configuration.
/// `Ok(None)` means "not applicable, try the next source".
pub trait ConfigSource {
    fn label(&self) -> &'static str;

    /// Sources that block on a human are skipped in non-interactive resolution
    fn is_interactive(&self) -> bool {
        false
    }

    fn resolve(&self) -> Result<Option<TelegramConfig>>;
}

/// Walk `sources` in order and stop at the first one that resolves
pub fn resolve_first(
    sources: &[&dyn ConfigSource],
    allow_interactive: bool,
) -> Result<Option<TelegramConfig>> {
    for source in sources {
        if source.is_interactive() && !allow_interactive {
            continue;
        }
        if let Some(config) = source.resolve()? {
            tracing::debug!(source = source.label(), "Resolved Telegram configuration");
            return Ok(Some(config));
        }
        tracing::debug!(source = source.label(), "Telegram configuration source not applicable");
    }
    Ok(None)
}

/// Configuration persisted by an earlier prompt
pub struct SavedConfig<'a> {
    store: &'a TelegramStore,
}

impl<'a> SavedConfig<'a> {
    pub fn new(store: &'a TelegramStore) -> Self {
        Self { store }
    }
}

impl ConfigSource for SavedConfig<'_> {
    fn label(&self) -> &'static str {
        "saved file"
    }

    fn resolve(&self) -> Result<Option<TelegramConfig>> {
        match self.store.load() {
            Ok(config) => Ok(Some(config)),
            Err(AuthError::NotFound(_)) => Ok(None),
            Err(e @ AuthError::Invalid { .. }) => {
                tracing::warn!(path = %self.store.path().display(), error = %e, "Ignoring unusable Telegram configuration");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Credentials injected by an automation host; never persisted
#[derive(Clone, Default)]
pub struct HostEnv {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl HostEnv {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>) -> Self {
        Self { bot_token, chat_id }
    }

    /// Snapshot of the host variables in the current process environment
    pub fn from_process_env() -> Self {
        Self::new(
            std::env::var(HOST_BOT_TOKEN_VAR).ok(),
            std::env::var(HOST_CHAT_ID_VAR).ok(),
        )
    }
}

impl ConfigSource for HostEnv {
    fn label(&self) -> &'static str {
        "host environment"
    }

    fn resolve(&self) -> Result<Option<TelegramConfig>> {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match (non_blank(&self.bot_token), non_blank(&self.chat_id)) {
            (Some(bot_token), Some(chat_id)) => Ok(Some(TelegramConfig { bot_token, chat_id })),
            _ => Ok(None),
        }
    }
}

/// First-run setup on standard input; persists what the user typed
pub struct PromptSetup<'a> {
    prompter: &'a SharedPrompter,
    store: &'a TelegramStore,
}

impl<'a> PromptSetup<'a> {
    pub fn new(prompter: &'a SharedPrompter, store: &'a TelegramStore) -> Self {
        Self { prompter, store }
    }
}

impl ConfigSource for PromptSetup<'_> {
    fn label(&self) -> &'static str {
        "interactive prompt"
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn resolve(&self) -> Result<Option<TelegramConfig>> {
        notice(self.prompter, "Telegram delivery is not configured yet.")?;
        notice(
            self.prompter,
            "Create a bot with @BotFather and message it once to get your chat id.",
        )?;

        let bot_token = ask_required(self.prompter, "Telegram bot token", "Bot token", true)?;
        let chat_id = ask_required(self.prompter, "Telegram chat ID", "Chat ID", false)?;

        let config = TelegramConfig { bot_token, chat_id };
        self.store.save(&config)?;
        Ok(Some(config))
    }
}
