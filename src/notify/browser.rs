// Local browser delivery: fire-and-forget process spawn

use std::process::{Command, Stdio};

use crate::error::{AuthError, Result};

/// Opens a URL for the user on this machine
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Platform launcher (`open`, `xdg-open`, `rundll32`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

/// Launcher program and arguments for an operating system family
pub fn launcher_command(os: &str, url: &str) -> (&'static str, Vec<String>) {
    match os {
        "macos" => ("open", vec![url.to_string()]),
        "windows" => (
            "rundll32",
            vec!["url.dll,FileProtocolHandler".to_string(), url.to_string()],
        ),
        _ => ("xdg-open", vec![url.to_string()]),
    }
}

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let (program, args) = launcher_command(std::env::consts::OS, url);
        tracing::debug!(program = program, "Spawning browser launcher");

        // Success means the launcher started; its outcome is not awaited
        Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| AuthError::Browser(format!("{}: {}", program, e)))
    }
}
