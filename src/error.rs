// Error handling module
// Defines the error taxonomy shared by the credential, vault and delivery layers

use thiserror::Error;

/// Errors surfaced by the credential and token lifecycle
#[derive(Error, Debug)]
pub enum AuthError {
    /// Expected-absent resource (credentials, token, messaging config)
    #[error("{0} not found")]
    NotFound(String),

    /// Document present but malformed or semantically incomplete
    #[error("Invalid {what}: {reason}")]
    Invalid { what: String, reason: String },

    /// Structurally valid document lacking required fields
    #[error("{0}")]
    MissingFields(String),

    /// Filesystem access failure
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Native secret store cannot be opened or used
    #[error("Secret store unavailable: {0}")]
    VaultUnavailable(String),

    /// Messaging provider reported failure; description is passed through verbatim
    #[error("Telegram API error: {0}")]
    ChannelApi(String),

    /// Interactive prompt received a blank value
    #[error("{0} cannot be empty")]
    EmptyInput(String),

    /// Transport failure talking to a remote endpoint
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// OAuth endpoint rejected a request
    #[error("OAuth provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    /// Local browser could not be started
    #[error("Failed to open browser: {0}")]
    Browser(String),
}

impl AuthError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AuthError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn invalid(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AuthError::Invalid {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the expected-absent outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::NotFound(_))
    }

    /// Remediation line shown under the error message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AuthError::NotFound(what) if what.starts_with("Credentials") => {
                Some("run: authctl auth credentials set <path>")
            }
            AuthError::NotFound(what) if what.contains("token") => Some("run: authctl auth login"),
            AuthError::VaultUnavailable(_) => Some(
                "start your platform secret service, or use --vault encrypted-file with AUTHCTL_VAULT_PASSPHRASE",
            ),
            AuthError::ChannelApi(_) => {
                Some("check the bot token and chat id, or run: authctl auth telegram reset")
            }
            AuthError::Browser(_) => Some("retry with --delivery telegram"),
            _ => None,
        }
    }
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, AuthError>;
