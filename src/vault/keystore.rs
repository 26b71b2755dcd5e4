//! Platform keystore backend
//!
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (gnome-keyring, KeePassXC, ...)

use keyring::Entry;
use tracing::debug;

use super::SecretBackend;
use crate::error::{AuthError, Result};

pub struct KeyringBackend {
    service_name: String,
}

impl KeyringBackend {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, key).map_err(|e| map_keyring_error(key, e))
    }
}

/// `NoEntry` is the expected-absent outcome; everything else means the store is unusable
fn map_keyring_error(key: &str, e: keyring::Error) -> AuthError {
    match e {
        keyring::Error::NoEntry => AuthError::NotFound(key.to_string()),
        other => AuthError::VaultUnavailable(other.to_string()),
    }
}

impl SecretBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entry(key)?
            .set_secret(value)
            .map_err(|e| map_keyring_error(key, e))?;
        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let secret = self
            .entry(key)?
            .get_secret()
            .map_err(|e| map_keyring_error(key, e))?;
        debug!(key = key, "Retrieved secret from keyring");
        Ok(secret)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entry(key)?
            .delete_credential()
            .map_err(|e| map_keyring_error(key, e))?;
        debug!(key = key, "Deleted secret from keyring");
        Ok(())
    }
}
