// Credential store: OAuth client identity persisted as JSON in the config directory

use std::path::{Path, PathBuf};

use super::types::Credentials;
use crate::config::write_private_file;
use crate::error::{AuthError, Result};

const MISSING_FIELDS: &str = "JSON must contain client_id and client_secret";

/// Reads, writes and validates `credentials.json`
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted credentials
    pub fn load(&self) -> Result<Credentials> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotFound("Credentials file".to_string()));
            }
            Err(e) => return Err(AuthError::io(&self.path, e)),
        };

        let creds: Credentials = serde_json::from_slice(&data)
            .map_err(|e| AuthError::invalid("credentials file", e))?;

        if !creds.is_complete() {
            return Err(AuthError::invalid(
                "credentials file",
                "missing client_id or client_secret",
            ));
        }

        tracing::debug!(path = %self.path.display(), "Loaded client credentials");
        Ok(creds)
    }

    /// Overwrite the persisted credentials
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if !creds.is_complete() {
            return Err(AuthError::invalid(
                "credentials",
                "client_id and client_secret must not be empty",
            ));
        }

        let data = serde_json::to_vec_pretty(creds)
            .map_err(|e| AuthError::invalid("credentials", e))?;
        write_private_file(&self.path, &data)?;

        tracing::info!(path = %self.path.display(), "Saved client credentials");
        Ok(())
    }

    /// Import credentials from an external JSON file; the store is untouched on failure
    pub fn import(&self, source: &Path) -> Result<Credentials> {
        let data = std::fs::read(source).map_err(|e| AuthError::io(source, e))?;

        let creds: Credentials = serde_json::from_slice(&data)
            .map_err(|e| AuthError::invalid(format!("credentials JSON {}", source.display()), e))?;

        if !creds.is_complete() {
            return Err(AuthError::MissingFields(MISSING_FIELDS.to_string()));
        }

        self.save(&creds)?;
        Ok(creds)
    }
}
