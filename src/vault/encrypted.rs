//! Encrypted file backend for platforms without a native keystore.
//!
//! Entries are sealed with AES-256-GCM under a key derived from a user passphrase
//! with PBKDF2-HMAC-SHA256. The salt lives in the file, a fresh nonce is drawn per
//! entry and the entry key is bound in as associated data, so a ciphertext copied
//! under another key fails to open.
//!
//! Every file carries a sealed check value. Writes open it first, so a mistyped
//! passphrase is refused instead of mixing two keys in one file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::SecretBackend;
use crate::config::write_private_file;
use crate::error::{AuthError, Result};

/// Current version of the vault file format
const VAULT_VERSION: u32 = 1;

/// PBKDF2 iterations for newly created vault files
const PBKDF2_ITERATIONS: u32 = 100_000;

const SALT_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;

/// Plaintext and associated data of the passphrase check value
const CHECK_PLAINTEXT: &[u8] = b"authctl-vault-check";
const CHECK_AAD: &[u8] = b"authctl:vault-check";

#[derive(Debug, Serialize, Deserialize)]
struct SealedEntry {
    nonce: String,
    ciphertext: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    version: u32,
    iterations: u32,
    salt: String,
    /// Absent in files written before the check value existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check: Option<SealedEntry>,
    entries: BTreeMap<String, SealedEntry>,
}

pub struct EncryptedFileBackend {
    path: PathBuf,
    passphrase: Zeroizing<String>,
    iterations: u32,
}

impl EncryptedFileBackend {
    pub fn new(path: impl Into<PathBuf>, passphrase: &str) -> Self {
        Self::with_iterations(path, passphrase, PBKDF2_ITERATIONS)
    }

    /// Iteration count applies only when this backend creates the file
    pub fn with_iterations(path: impl Into<PathBuf>, passphrase: &str, iterations: u32) -> Self {
        Self {
            path: path.into(),
            passphrase: Zeroizing::new(passphrase.to_string()),
            iterations: iterations.max(1),
        }
    }

    fn read_file(&self) -> Result<Option<VaultFile>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::io(&self.path, e)),
        };
        let file: VaultFile = serde_json::from_slice(&data)
            .map_err(|e| AuthError::VaultUnavailable(format!("corrupt vault file: {}", e)))?;
        if file.version != VAULT_VERSION {
            return Err(AuthError::VaultUnavailable(format!(
                "unsupported vault file version {}",
                file.version
            )));
        }
        Ok(Some(file))
    }

    fn write_file(&self, file: &VaultFile) -> Result<()> {
        let data = serde_json::to_vec_pretty(file)
            .map_err(|e| AuthError::VaultUnavailable(format!("cannot encode vault file: {}", e)))?;
        write_private_file(&self.path, &data)
    }

    /// Fresh file with a new salt and a check value sealed under this passphrase
    fn new_file(&self) -> Result<(VaultFile, Aes256Gcm)> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        let mut file = VaultFile {
            version: VAULT_VERSION,
            iterations: self.iterations,
            salt: STANDARD.encode(salt),
            check: None,
            entries: BTreeMap::new(),
        };
        let cipher = self.cipher(&file)?;
        file.check = Some(seal(&cipher, CHECK_AAD, CHECK_PLAINTEXT)?);
        Ok((file, cipher))
    }

    /// Cipher for an existing file, refusing a passphrase the file was not sealed with
    fn unlock(&self, file: &mut VaultFile) -> Result<Aes256Gcm> {
        let cipher = self.cipher(file)?;
        if let Some(check) = &file.check {
            if open(&cipher, CHECK_AAD, check)? != CHECK_PLAINTEXT {
                return Err(wrong_passphrase());
            }
            return Ok(cipher);
        }

        // Older file: any existing entry proves the key, then the check is added
        if let Some((key, entry)) = file.entries.iter().next() {
            open(&cipher, key.as_bytes(), entry)?;
        }
        file.check = Some(seal(&cipher, CHECK_AAD, CHECK_PLAINTEXT)?);
        Ok(cipher)
    }

    fn cipher(&self, file: &VaultFile) -> Result<Aes256Gcm> {
        let salt = STANDARD
            .decode(&file.salt)
            .map_err(|e| AuthError::VaultUnavailable(format!("invalid vault salt: {}", e)))?;

        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2_hmac::<Sha256>(
            self.passphrase.as_bytes(),
            &salt,
            file.iterations,
            &mut key[..],
        );

        Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| AuthError::VaultUnavailable(format!("invalid vault key: {}", e)))
    }
}

impl SecretBackend for EncryptedFileBackend {
    fn name(&self) -> &'static str {
        "encrypted-file"
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let (mut file, cipher) = match self.read_file()? {
            Some(mut file) => {
                let cipher = self.unlock(&mut file)?;
                (file, cipher)
            }
            None => self.new_file()?,
        };

        file.entries
            .insert(key.to_string(), seal(&cipher, key.as_bytes(), value)?);
        self.write_file(&file)?;

        tracing::debug!(key = key, path = %self.path.display(), "Sealed secret in vault file");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let file = self
            .read_file()?
            .ok_or_else(|| AuthError::NotFound(key.to_string()))?;
        let entry = file
            .entries
            .get(key)
            .ok_or_else(|| AuthError::NotFound(key.to_string()))?;
        let cipher = self.cipher(&file)?;
        open(&cipher, key.as_bytes(), entry)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut file = self
            .read_file()?
            .ok_or_else(|| AuthError::NotFound(key.to_string()))?;
        self.unlock(&mut file)?;
        if file.entries.remove(key).is_none() {
            return Err(AuthError::NotFound(key.to_string()));
        }
        self.write_file(&file)
    }
}

fn wrong_passphrase() -> AuthError {
    AuthError::VaultUnavailable("cannot decrypt vault entry (wrong passphrase?)".to_string())
}

fn seal(cipher: &Aes256Gcm, aad: &[u8], msg: &[u8]) -> Result<SealedEntry> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg, aad })
        .map_err(|_| AuthError::VaultUnavailable("encryption failed".to_string()))?;
    Ok(SealedEntry {
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

fn open(cipher: &Aes256Gcm, aad: &[u8], entry: &SealedEntry) -> Result<Vec<u8>> {
    let nonce = STANDARD
        .decode(&entry.nonce)
        .ok()
        .filter(|n| n.len() == NONCE_LENGTH)
        .ok_or_else(|| AuthError::VaultUnavailable("invalid nonce in vault file".to_string()))?;
    let ciphertext = STANDARD
        .decode(&entry.ciphertext)
        .map_err(|e| AuthError::VaultUnavailable(format!("invalid ciphertext: {}", e)))?;

    cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad,
            },
        )
        .map_err(|_| wrong_passphrase())
}
