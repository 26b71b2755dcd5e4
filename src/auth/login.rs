// Login orchestration and read-only status reporting

use super::credentials::CredentialStore;
use super::mode::ModeResolver;
use super::provider::{LoginContext, OAuthProvider, UrlDelivery};
use super::types::{AuthStatus, Credentials, Mode, TokenKind, TokenState};
use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::vault::{token_key, TokenVault};

/// Steps of a login; terminal on success or on the first error
#[derive(Debug)]
enum LoginState {
    ResolvingMode,
    ObtainingCredentials(Mode),
    DelegatingExchange {
        mode: Mode,
        credentials: Option<Credentials>,
    },
}

/// Coordinates mode resolution, credential loading and the OAuth exchange
pub struct LoginOrchestrator<P> {
    resolver: ModeResolver,
    credentials: CredentialStore,
    vault: TokenVault,
    provider: P,
}

impl<P: OAuthProvider> LoginOrchestrator<P> {
    pub fn new(config: &Config, vault: TokenVault, provider: P) -> Self {
        Self {
            resolver: ModeResolver::new(config.credentials_path()),
            credentials: CredentialStore::new(config.credentials_path()),
            vault,
            provider,
        }
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    /// Run the login flow, handing `delivery` to the provider for the authorization URL
    pub async fn login(&self, delivery: &dyn UrlDelivery) -> Result<Mode> {
        let mut state = LoginState::ResolvingMode;

        loop {
            tracing::debug!(state = ?state, "Login step");
            state = match state {
                LoginState::ResolvingMode => LoginState::ObtainingCredentials(self.resolver.resolve()),

                // Hosted mode deliberately carries no client identity
                LoginState::ObtainingCredentials(Mode::Hosted) => LoginState::DelegatingExchange {
                    mode: Mode::Hosted,
                    credentials: None,
                },

                LoginState::ObtainingCredentials(Mode::Local) => {
                    let credentials = self.credentials.load()?;
                    LoginState::DelegatingExchange {
                        mode: Mode::Local,
                        credentials: Some(credentials),
                    }
                }

                LoginState::DelegatingExchange { mode, credentials } => {
                    self.provider
                        .login(LoginContext {
                            mode,
                            credentials: credentials.as_ref(),
                            delivery,
                            vault: &self.vault,
                        })
                        .await?;
                    tracing::info!(mode = %mode, "Login complete");
                    return Ok(mode);
                }
            };
        }
    }

    /// Report mode and token validity without mutating anything
    pub fn status(&self) -> AuthStatus {
        let mode = self.resolver.resolve();
        AuthStatus {
            mode,
            client: self.token_state(mode, TokenKind::Client),
            user: self.token_state(mode, TokenKind::User),
        }
    }

    fn token_state(&self, mode: Mode, kind: TokenKind) -> TokenState {
        match self.vault.load(&token_key(mode, kind)) {
            Ok(token) if token.is_valid() => TokenState::Valid {
                expiry: token.expiry,
            },
            Ok(_) => TokenState::Expired,
            Err(AuthError::NotFound(_)) => TokenState::Missing,
            Err(e) => {
                tracing::debug!(kind = kind.as_str(), error = %e, "Token unreadable");
                TokenState::Unreadable(e.to_string())
            }
        }
    }

    /// Delete both tokens of the current mode; returns how many existed
    pub fn logout(&self) -> Result<(Mode, usize)> {
        let mode = self.resolver.resolve();
        let mut removed = 0;
        for kind in [TokenKind::Client, TokenKind::User] {
            match self.vault.delete(&token_key(mode, kind)) {
                Ok(()) => removed += 1,
                Err(AuthError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok((mode, removed))
    }
}
