use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AuthError;
use crate::notify::DeliveryPolicy;
use crate::vault::VaultBackendKind;

/// Default OAuth proxy used in hosted mode
pub const DEFAULT_PROXY_URL: &str = "https://us-central1-krocli.cloudfunctions.net";

/// Default base URL of the protected API
pub const DEFAULT_API_URL: &str = "https://api.kroger.com/v1";

/// Default Telegram Bot API endpoint
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

pub const DEFAULT_SCOPE: &str = "cart.basic:write profile.compact";

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/callback";

const CREDENTIALS_FILE: &str = "credentials.json";
const TELEGRAM_FILE: &str = "telegram.json";
const VAULT_FILE: &str = "vault.json";

/// authctl - credential and session-token manager
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding credentials.json and telegram.json
    #[arg(long, global = true, env = "AUTHCTL_CONFIG_DIR")]
    pub config_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// How to deliver the login URL (auto, browser, telegram)
    #[arg(long, global = true, env = "AUTHCTL_DELIVERY", default_value = "auto")]
    pub delivery: String,

    /// Token vault backend (keyring, encrypted-file)
    #[arg(long, global = true, env = "AUTHCTL_VAULT", default_value = "keyring")]
    pub vault: String,

    /// Passphrase for the encrypted-file vault
    #[arg(
        long,
        global = true,
        env = "AUTHCTL_VAULT_PASSPHRASE",
        hide_env_values = true
    )]
    pub vault_passphrase: Option<String>,

    /// OAuth proxy used in hosted mode
    #[arg(long, global = true, env = "AUTHCTL_PROXY_URL", default_value = DEFAULT_PROXY_URL)]
    pub proxy_url: String,

    /// Base URL of the protected API (local mode)
    #[arg(long, global = true, env = "AUTHCTL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Telegram Bot API endpoint
    #[arg(
        long,
        global = true,
        env = "AUTHCTL_TELEGRAM_API_URL",
        default_value = DEFAULT_TELEGRAM_API_URL
    )]
    pub telegram_api_url: String,

    /// Redirect URI registered with your OAuth client (local mode)
    #[arg(long, global = true, env = "AUTHCTL_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// OAuth scopes requested at login
    #[arg(long, global = true, env = "AUTHCTL_SCOPE", default_value = DEFAULT_SCOPE)]
    pub scope: String,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authentication and credential management
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Login via the OAuth flow
    Login,
    /// Show current auth state
    Status,
    /// Remove stored tokens for the current mode
    Logout,
    /// Manage API credentials
    Credentials {
        #[command(subcommand)]
        command: CredentialsCommand,
    },
    /// Manage the Telegram delivery channel
    Telegram {
        #[command(subcommand)]
        command: TelegramCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Import credentials from a JSON file with client_id and client_secret
    Set { path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum TelegramCommand {
    /// Forget the saved bot token and chat id
    Reset,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Per-user configuration directory
    pub config_dir: PathBuf,

    pub log_level: String,

    // Delivery and storage
    pub delivery: DeliveryPolicy,
    pub vault_backend: VaultBackendKind,

    // Endpoints
    pub proxy_url: String,
    pub api_url: String,
    pub telegram_api_url: String,
    pub redirect_uri: String,
    pub scope: String,

    // HTTP client
    pub http_timeout: u64,
}

impl Config {
    /// Build configuration from parsed arguments (CLI > ENV > defaults)
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config_dir = match args.config_dir.as_deref() {
            Some(dir) => expand_tilde(dir),
            None => default_config_dir()?,
        };

        Ok(Config {
            config_dir,
            log_level: args.log_level.clone(),
            delivery: parse_delivery_policy(&args.delivery),
            vault_backend: parse_vault_backend(&args.vault),
            proxy_url: trim_url(&args.proxy_url),
            api_url: trim_url(&args.api_url),
            telegram_api_url: trim_url(&args.telegram_api_url),
            redirect_uri: args.redirect_uri.clone(),
            scope: args.scope.clone(),
            http_timeout: args.http_timeout,
        })
    }

    /// Configuration rooted at `config_dir` with every other value defaulted
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Config {
            config_dir: config_dir.into(),
            log_level: "warn".to_string(),
            delivery: DeliveryPolicy::Auto,
            vault_backend: VaultBackendKind::Keyring,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            http_timeout: 30,
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    pub fn telegram_path(&self) -> PathBuf {
        self.config_dir.join(TELEGRAM_FILE)
    }

    pub fn vault_path(&self) -> PathBuf {
        self.config_dir.join(VAULT_FILE)
    }
}

/// ~/.config/authctl
fn default_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("authctl"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Parse delivery policy from string
fn parse_delivery_policy(s: &str) -> DeliveryPolicy {
    match s.to_lowercase().as_str() {
        "browser" => DeliveryPolicy::Browser,
        "telegram" => DeliveryPolicy::Telegram,
        _ => DeliveryPolicy::Auto,
    }
}

/// Parse vault backend from string
fn parse_vault_backend(s: &str) -> VaultBackendKind {
    match s.to_lowercase().replace('_', "-").as_str() {
        "encrypted-file" | "file" => VaultBackendKind::EncryptedFile,
        _ => VaultBackendKind::Keyring,
    }
}

// === Per-user directory helpers ===

/// Create `dir` (and parents) with owner-only permissions
pub fn ensure_private_dir(dir: &Path) -> crate::error::Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| AuthError::io(dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| AuthError::io(dir, e))?;
    }

    Ok(())
}

/// Overwrite `path` with `data`, readable by the owner only
pub fn write_private_file(path: &Path, data: &[u8]) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    // Created owner-only, so the contents are never readable by others
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| AuthError::io(path, e))?;

    // Files that already existed keep their old mode until tightened here
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| AuthError::io(path, e))?;
    }

    file.write_all(data).map_err(|e| AuthError::io(path, e))?;
    Ok(())
}
