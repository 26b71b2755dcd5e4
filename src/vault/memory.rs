// In-process backend for tests and embedders without a keystore

use std::collections::HashMap;
use std::sync::Mutex;

use super::SecretBackend;
use crate::error::{AuthError, Result};

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that behaves like a keystore whose daemon is not running
    pub fn unavailable() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        if self.unavailable {
            return Err(AuthError::VaultUnavailable(
                "memory backend disabled".to_string(),
            ));
        }
        self.entries
            .lock()
            .map_err(|_| AuthError::VaultUnavailable("memory backend poisoned".to_string()))
    }
}

impl SecretBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries()?
            .get(key)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AuthError::NotFound(key.to_string()))
    }
}
