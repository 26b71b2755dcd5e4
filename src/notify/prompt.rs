// Interactive input, injectable so tests can script standard input

use std::io::{BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use dialoguer::{Input, Password};

use crate::error::{AuthError, Result};

/// Line-oriented question/answer source, also the sink for user-facing notices
pub trait Prompter: Send {
    /// Show an informational line to the user
    fn notice(&mut self, message: &str) -> Result<()>;

    /// Ask for a visible value; returns the trimmed answer (possibly empty)
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Ask for a value that should not be echoed
    fn secret(&mut self, prompt: &str) -> Result<String>;
}

/// One prompter shared by every component that may ask the user something,
/// so buffered standard input is read by a single reader
pub type SharedPrompter = Arc<Mutex<Box<dyn Prompter>>>;

pub fn shared(prompter: impl Prompter + 'static) -> SharedPrompter {
    Arc::new(Mutex::new(Box::new(prompter)))
}

/// Terminal prompts when attached to a TTY, plain line reads otherwise
pub fn default_prompter() -> SharedPrompter {
    if std::io::stdin().is_terminal() {
        shared(TerminalPrompter)
    } else {
        shared(ReaderPrompter::new(
            std::io::BufReader::new(std::io::stdin()),
            std::io::stderr(),
        ))
    }
}

fn lock(prompter: &SharedPrompter) -> Result<std::sync::MutexGuard<'_, Box<dyn Prompter>>> {
    prompter
        .lock()
        .map_err(|_| AuthError::io("<stdin>", std::io::Error::other("prompter lock poisoned")))
}

/// Show `message` through a shared prompter
pub fn notice(prompter: &SharedPrompter, message: &str) -> Result<()> {
    lock(prompter)?.notice(message)
}

/// Ask through a shared prompter, rejecting blank answers
pub fn ask_required(prompter: &SharedPrompter, prompt: &str, field: &str, secret: bool) -> Result<String> {
    let mut guard = lock(prompter)?;
    let answer = if secret {
        guard.secret(prompt)?
    } else {
        guard.input(prompt)?
    };
    if answer.is_empty() {
        return Err(AuthError::EmptyInput(field.to_string()));
    }
    Ok(answer)
}

/// dialoguer-backed prompts for interactive terminals
pub struct TerminalPrompter;

fn terminal_error(e: dialoguer::Error) -> AuthError {
    AuthError::io("<terminal>", std::io::Error::other(e.to_string()))
}

impl Prompter for TerminalPrompter {
    fn notice(&mut self, message: &str) -> Result<()> {
        writeln!(std::io::stderr(), "{}", message).map_err(|e| AuthError::io("<stderr>", e))
    }

    fn input(&mut self, prompt: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(terminal_error)?;
        Ok(answer.trim().to_string())
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        let answer = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(terminal_error)?;
        Ok(answer.trim().to_string())
    }
}

/// Reads answers line by line from any reader, echoing prompts to `out`.
/// End of input yields an empty answer.
pub struct ReaderPrompter<R, W> {
    reader: R,
    out: W,
}

impl<R: BufRead + Send, W: Write + Send> ReaderPrompter<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        Self { reader, out }
    }

    fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.out, "{}: ", prompt).map_err(|e| AuthError::io("<stderr>", e))?;
        self.out.flush().map_err(|e| AuthError::io("<stderr>", e))?;

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| AuthError::io("<stdin>", e))?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for ReaderPrompter<R, W> {
    fn notice(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{}", message).map_err(|e| AuthError::io("<stderr>", e))
    }

    fn input(&mut self, prompt: &str) -> Result<String> {
        self.read_answer(prompt)
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        self.read_answer(prompt)
    }
}
