// Collaborator contracts: the OAuth exchange and the URL delivery callback it uses

use async_trait::async_trait;

use super::types::{Credentials, Mode};
use crate::error::Result;
use crate::vault::TokenVault;

/// Presents an authorization URL to the user.
/// Returns once delivery is dispatched, not once the user has acted on it.
#[async_trait]
pub trait UrlDelivery: Send + Sync {
    async fn deliver(&self, url: &str) -> Result<()>;
}

/// Everything the exchange needs from the orchestrator
pub struct LoginContext<'a> {
    pub mode: Mode,
    /// `None` in hosted mode, where a remote proxy holds the client identity
    pub credentials: Option<&'a Credentials>,
    pub delivery: &'a dyn UrlDelivery,
    pub vault: &'a TokenVault,
}

/// Performs the authorization-code exchange with the remote API.
/// On success the resulting tokens are stored in `ctx.vault`.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn login(&self, ctx: LoginContext<'_>) -> Result<()>;
}
