use anyhow::Result;
use clap::Parser;

use authctl::auth::{CredentialStore, HttpOAuthProvider, LoginOrchestrator, ModeResolver, TokenState};
use authctl::config::{AuthCommand, CliArgs, Command, Config, CredentialsCommand, TelegramCommand};
use authctl::error::AuthError;
use authctl::http_client::build_client;
use authctl::notify::{default_prompter, ChannelSelector, SharedPrompter, TelegramStore};
use authctl::vault::TokenVault;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // Logs go to stderr so stdout stays readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(config_dir = %config.config_dir.display(), "Configuration loaded");

    if let Err(e) = run(&args, &config).await {
        exit_with(&e);
    }
}

fn exit_with(err: &anyhow::Error) -> ! {
    eprintln!("✗ {}", err);
    if let Some(hint) = err.downcast_ref::<AuthError>().and_then(AuthError::hint) {
        eprintln!("  {}", hint);
    }
    std::process::exit(1);
}

async fn run(args: &CliArgs, config: &Config) -> Result<()> {
    match &args.command {
        Command::Auth { command } => match command {
            AuthCommand::Login => login(args, config).await,
            AuthCommand::Status => status(args, config),
            AuthCommand::Logout => logout(args, config),
            AuthCommand::Credentials {
                command: CredentialsCommand::Set { path },
            } => {
                let store = CredentialStore::new(config.credentials_path());
                let creds = store.import(path)?;
                println!("✓ Credentials saved to {}", store.path().display());
                println!("  client_id: {}", creds.client_id);
                Ok(())
            }
            AuthCommand::Telegram {
                command: TelegramCommand::Reset,
            } => {
                if TelegramStore::new(config.telegram_path()).reset()? {
                    println!("✓ Telegram configuration removed");
                } else {
                    println!("! No saved Telegram configuration");
                }
                Ok(())
            }
        },
    }
}

fn orchestrator(
    args: &CliArgs,
    config: &Config,
    prompter: SharedPrompter,
) -> Result<LoginOrchestrator<HttpOAuthProvider>> {
    let vault = TokenVault::open(config, args.vault_passphrase.as_deref())?;
    let provider = HttpOAuthProvider::new(config, build_client(config.http_timeout)?, prompter);
    Ok(LoginOrchestrator::new(config, vault, provider))
}

async fn login(args: &CliArgs, config: &Config) -> Result<()> {
    let prompter = default_prompter();
    let client = build_client(config.http_timeout)?;
    let orch = orchestrator(args, config, prompter.clone())?;
    let selector = ChannelSelector::from_config(config, client, prompter);

    let mode = orch.login(&selector).await?;
    println!("✓ Logged in ({} mode)", mode);
    Ok(())
}

fn status(args: &CliArgs, config: &Config) -> Result<()> {
    let orch = match orchestrator(args, config, default_prompter()) {
        Ok(orch) => orch,
        // Status never fails on an unreachable vault
        Err(e) => {
            println!("Mode: {}", ModeResolver::new(config.credentials_path()).resolve());
            println!("! Token vault unavailable: {}", e);
            if let Some(hint) = e.downcast_ref::<AuthError>().and_then(AuthError::hint) {
                println!("  {}", hint);
            }
            return Ok(());
        }
    };

    let status = orch.status();
    println!("Mode: {}", status.mode);
    println!("Vault: {}", orch.vault().backend_name());

    let mut needs_login = false;
    for (label, state) in [("Client token", &status.client), ("User token", &status.user)] {
        match state {
            TokenState::Valid { expiry } => {
                println!("✓ {}: valid until {}", label, expiry.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            TokenState::Expired => {
                needs_login = true;
                println!("! {}: expired", label);
            }
            TokenState::Missing => {
                needs_login = true;
                println!("! {}: not found", label);
            }
            TokenState::Unreadable(reason) => {
                needs_login = true;
                println!("! {}: unreadable ({})", label, reason);
            }
        }
    }
    if needs_login {
        println!("  run: authctl auth login");
    }
    Ok(())
}

fn logout(args: &CliArgs, config: &Config) -> Result<()> {
    let (mode, removed) = orchestrator(args, config, default_prompter())?.logout()?;
    if removed == 0 {
        println!("! No stored tokens for {} mode", mode);
    } else {
        println!("✓ Removed {} token(s) for {} mode", removed, mode);
    }
    Ok(())
}
