// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// OAuth client identity imported by the user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Both fields are required
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Token record persisted in the vault
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    pub token_type: String,
}

impl TokenData {
    /// Build a token expiring `expires_in` seconds from now.
    /// Fails when the lifetime does not fit a representable timestamp.
    pub fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        token_type: Option<String>,
    ) -> Result<Self> {
        let expiry = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::invalid("token response", "expires_in out of range"))?;

        Ok(Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expiry,
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry
    }

    /// Usable for an API call right now
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }
}

impl fmt::Debug for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenData")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Operation mode, derived from the filesystem on every invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No local client credentials; a remote proxy brokers OAuth
    Hosted,
    /// User imported their own client credentials
    Local,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Hosted => "hosted",
            Mode::Local => "local",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose of a stored token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Client-credentials grant, app-level access
    Client,
    /// Authorization-code grant, acts on behalf of the user
    User,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Client => "client",
            TokenKind::User => "user",
        }
    }
}

/// What the vault holds for one token purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Valid { expiry: DateTime<Utc> },
    Expired,
    Missing,
    /// Vault could not be read; carries the reason
    Unreadable(String),
}

impl TokenState {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenState::Valid { .. })
    }
}

/// Read-only snapshot reported by `auth status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStatus {
    pub mode: Mode,
    pub client: TokenState,
    pub user: TokenState,
}
