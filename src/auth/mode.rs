// Mode resolution: hosted exactly when no credentials file exists

use std::path::{Path, PathBuf};

use super::types::Mode;

/// Derives the operation mode from the presence of the credentials file.
///
/// The check never creates directories and is recomputed on every call.
#[derive(Debug, Clone)]
pub struct ModeResolver {
    credentials_path: PathBuf,
}

impl ModeResolver {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
        }
    }

    /// True when the credentials file is definitely absent.
    /// Any other outcome (including permission errors) counts as local.
    pub fn is_hosted(&self) -> bool {
        is_absent(&self.credentials_path)
    }

    pub fn resolve(&self) -> Mode {
        let mode = if self.is_hosted() {
            Mode::Hosted
        } else {
            Mode::Local
        };
        tracing::debug!(mode = %mode, path = %self.credentials_path.display(), "Resolved mode");
        mode
    }
}

fn is_absent(path: &Path) -> bool {
    matches!(
        std::fs::metadata(path),
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound
    )
}
