//! Token vault: opaque token records in a secret store, addressed by logical key.
//!
//! The vault owns key naming and the JSON encoding of [`TokenData`]; backends only
//! move bytes. Production uses the platform keystore through [`KeyringBackend`].
//! Platforms without one can opt into [`EncryptedFileBackend`], which never writes
//! a secret in plaintext.

mod encrypted;
mod keystore;
mod memory;

pub use encrypted::EncryptedFileBackend;
pub use keystore::KeyringBackend;
pub use memory::MemoryBackend;

use crate::auth::{Mode, TokenData, TokenKind};
use crate::config::Config;
use crate::error::{AuthError, Result};

/// Service name under which entries are filed in the platform keystore
pub const SERVICE_NAME: &str = "authctl";

/// Byte-level capability every secret store provides
pub trait SecretBackend: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fails with `NotFound` when the key is absent
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Fails with `NotFound` when the key is absent
    fn delete(&self, key: &str) -> Result<()>;
}

/// Which backend a vault is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultBackendKind {
    Keyring,
    EncryptedFile,
}

/// Stable vault key for a token purpose within a mode, e.g. `hosted:user_token`
pub fn token_key(mode: Mode, kind: TokenKind) -> String {
    format!("{}:{}_token", mode.as_str(), kind.as_str())
}

pub struct TokenVault {
    backend: Box<dyn SecretBackend>,
}

impl TokenVault {
    pub fn new(backend: Box<dyn SecretBackend>) -> Self {
        Self { backend }
    }

    /// Open the backend selected in the configuration
    pub fn open(config: &Config, passphrase: Option<&str>) -> Result<Self> {
        let backend: Box<dyn SecretBackend> = match config.vault_backend {
            VaultBackendKind::Keyring => Box::new(KeyringBackend::new(SERVICE_NAME)),
            VaultBackendKind::EncryptedFile => {
                let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or_else(|| {
                    AuthError::VaultUnavailable(
                        "encrypted-file vault requires AUTHCTL_VAULT_PASSPHRASE".to_string(),
                    )
                })?;
                tracing::warn!(
                    path = %config.vault_path().display(),
                    "Using encrypted file vault instead of the platform keystore"
                );
                Box::new(EncryptedFileBackend::new(config.vault_path(), passphrase))
            }
        };
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn store(&self, key: &str, token: &TokenData) -> Result<()> {
        let payload =
            serde_json::to_vec(token).map_err(|e| AuthError::invalid("token record", e))?;
        self.backend.set(key, &payload)?;
        tracing::info!(key = key, backend = self.backend.name(), "Stored token");
        Ok(())
    }

    pub fn load(&self, key: &str) -> Result<TokenData> {
        let payload = self.backend.get(key)?;
        let token = serde_json::from_slice(&payload)
            .map_err(|e| AuthError::invalid(format!("token record {}", key), e))?;
        tracing::debug!(key = key, backend = self.backend.name(), "Loaded token");
        Ok(token)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key)?;
        tracing::info!(key = key, backend = self.backend.name(), "Deleted token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token() -> TokenData {
        TokenData::from_expires_in(
            "access".to_string(),
            Some("refresh".to_string()),
            1800,
            Some("bearer".to_string()),
        ).unwrap()
    }

    #[test]
    fn test_token_keys_distinguish_mode_and_kind() {
        assert_eq!(token_key(Mode::Hosted, TokenKind::User), "hosted:user_token");
        assert_eq!(token_key(Mode::Local, TokenKind::Client), "local:client_token");
        assert_ne!(
            token_key(Mode::Hosted, TokenKind::Client),
            token_key(Mode::Local, TokenKind::Client)
        );
    }

    #[test]
    fn test_store_load_delete() {
        let vault = TokenVault::new(Box::new(MemoryBackend::new()));
        let token = sample_token();

        vault.store("hosted:user_token", &token).unwrap();
        assert_eq!(vault.load("hosted:user_token").unwrap(), token);

        vault.delete("hosted:user_token").unwrap();
        assert!(vault.load("hosted:user_token").unwrap_err().is_not_found());
        assert!(vault.delete("hosted:user_token").unwrap_err().is_not_found());
    }

    #[test]
    fn test_modes_do_not_share_entries() {
        let vault = TokenVault::new(Box::new(MemoryBackend::new()));
        vault
            .store(&token_key(Mode::Hosted, TokenKind::User), &sample_token())
            .unwrap();

        let err = vault
            .load(&token_key(Mode::Local, TokenKind::User))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unavailable_backend() {
        let vault = TokenVault::new(Box::new(MemoryBackend::unavailable()));
        let token = sample_token();

        assert!(matches!(
            vault.store("k", &token),
            Err(AuthError::VaultUnavailable(_))
        ));
        assert!(matches!(vault.load("k"), Err(AuthError::VaultUnavailable(_))));
        assert!(matches!(
            vault.delete("k"),
            Err(AuthError::VaultUnavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_payload_is_invalid() {
        let backend = MemoryBackend::new();
        backend.set("hosted:user_token", b"not json").unwrap();
        let vault = TokenVault::new(Box::new(backend));

        assert!(matches!(
            vault.load("hosted:user_token"),
            Err(AuthError::Invalid { .. })
        ));
    }

    #[test]
    fn test_open_encrypted_file_requires_passphrase() {
        let mut config = Config::with_config_dir("/tmp/authctl-vault-open");
        config.vault_backend = VaultBackendKind::EncryptedFile;

        assert!(matches!(
            TokenVault::open(&config, None),
            Err(AuthError::VaultUnavailable(_))
        ));
        assert!(matches!(
            TokenVault::open(&config, Some("")),
            Err(AuthError::VaultUnavailable(_))
        ));

        let vault = TokenVault::open(&config, Some("correct horse battery")).unwrap();
        assert_eq!(vault.backend_name(), "encrypted-file");
    }
}
