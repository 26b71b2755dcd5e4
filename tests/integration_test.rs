// Integration tests for authctl
//
// These tests drive the public library API end to end: credential import,
// mode switching, URL delivery over a mocked Telegram API and full logins
// against a mocked OAuth proxy.

use mockito::Matcher;
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;

use authctl::{
    auth::{CredentialStore, HttpOAuthProvider, LoginOrchestrator, Mode, TokenState, UrlDelivery},
    config::Config,
    error::AuthError,
    notify::{
        shared, ChannelSelector, DeliveryPolicy, HostEnv, ReaderPrompter, SharedPrompter,
        TelegramClient, TelegramConfig, TelegramStore, UrlOpener,
    },
    vault::{MemoryBackend, TokenVault},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Prompter fed from a fixed script instead of standard input
fn scripted(input: &str) -> SharedPrompter {
    shared(ReaderPrompter::new(
        Cursor::new(input.to_string()),
        std::io::sink(),
    ))
}

/// Browser that is never available, forcing the Telegram path
struct NoDisplay;

impl UrlOpener for NoDisplay {
    fn open(&self, _url: &str) -> authctl::error::Result<()> {
        Err(AuthError::Browser("no display".to_string()))
    }
}

fn selector(
    config: &Config,
    server: &mockito::ServerGuard,
    prompter: SharedPrompter,
) -> ChannelSelector {
    ChannelSelector::new(
        config.delivery,
        TelegramStore::new(config.telegram_path()),
        TelegramClient::new(Client::new(), server.url()),
        prompter,
    )
    .with_host_env(HostEnv::default())
    .with_browser(Box::new(NoDisplay))
}

fn config_for(dir: &std::path::Path, server: &mockito::ServerGuard) -> Config {
    let mut config = Config::with_config_dir(dir);
    config.proxy_url = server.url();
    config.api_url = server.url();
    config.telegram_api_url = server.url();
    config
}

// ==================================================================================================
// Credentials and mode
// ==================================================================================================

#[test]
fn test_import_then_load_returns_exact_values() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("download.json");
    std::fs::write(
        &source,
        r#"{"client_id": "test-id", "client_secret": "test-secret"}"#,
    )
    .unwrap();

    let config = Config::with_config_dir(tmp.path().join("authctl"));
    let store = CredentialStore::new(config.credentials_path());
    store.import(&source).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.client_id, "test-id");
    assert_eq!(loaded.client_secret, "test-secret");

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(config.credentials_path()).unwrap()).unwrap();
    assert_eq!(on_disk["client_id"], "test-id");
}

#[test]
fn test_failed_import_leaves_store_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_config_dir(tmp.path());
    let store = CredentialStore::new(config.credentials_path());

    let missing = store.import(&tmp.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, AuthError::Io { .. }));

    let partial = tmp.path().join("partial.json");
    std::fs::write(&partial, r#"{"client_id": "only-id"}"#).unwrap();
    assert!(matches!(
        store.import(&partial),
        Err(AuthError::MissingFields(_))
    ));
    assert!(!config.credentials_path().exists());
}

#[test]
fn test_mode_follows_credentials_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_config_dir(tmp.path());
    let resolver = authctl::auth::ModeResolver::new(config.credentials_path());
    assert_eq!(resolver.resolve(), Mode::Hosted);

    let source = tmp.path().join("creds.json");
    std::fs::write(&source, r#"{"client_id":"a","client_secret":"b"}"#).unwrap();
    CredentialStore::new(config.credentials_path())
        .import(&source)
        .unwrap();
    assert_eq!(resolver.resolve(), Mode::Local);

    std::fs::remove_file(config.credentials_path()).unwrap();
    assert_eq!(resolver.resolve(), Mode::Hosted);
}

// ==================================================================================================
// Delivery
// ==================================================================================================

#[tokio::test]
async fn test_persisted_telegram_config_delivers_url() {
    let tmp = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let config = config_for(tmp.path(), &server);
    TelegramStore::new(config.telegram_path())
        .save(&TelegramConfig::new("validtoken", "111"))
        .unwrap();

    let mock = server
        .mock("POST", "/botvalidtoken/sendMessage")
        .match_body(Matcher::Regex(
            "text=[^&]*https%3A%2F%2Fexample\\.com%2Flogin".to_string(),
        ))
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    selector(&config, &server, scripted(""))
        .deliver("https://example.com/login")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_prompted_config_is_reused_on_next_delivery() {
    let tmp = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let config = config_for(tmp.path(), &server);

    let mock = server
        .mock("POST", "/botmybot:token/sendMessage")
        .match_body(Matcher::UrlEncoded("chat_id".into(), "12345".into()))
        .with_body(r#"{"ok":true}"#)
        .expect(2)
        .create_async()
        .await;

    selector(&config, &server, scripted("mybot:token\n12345\n"))
        .deliver("https://example.com/login")
        .await
        .unwrap();

    // Second run has no input left; it must not prompt again
    selector(&config, &server, scripted(""))
        .deliver("https://example.com/login")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_blocked_bot_reports_provider_description() {
    let tmp = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let config = config_for(tmp.path(), &server);
    TelegramStore::new(config.telegram_path())
        .save(&TelegramConfig::new("validtoken", "111"))
        .unwrap();
    server
        .mock("POST", "/botvalidtoken/sendMessage")
        .with_status(403)
        .with_body(r#"{"ok": false, "description": "Forbidden: bot was blocked by the user"}"#)
        .create_async()
        .await;

    let err = selector(&config, &server, scripted(""))
        .deliver("https://example.com/login")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("blocked"));
    assert!(err.hint().is_some());
}

// ==================================================================================================
// Login and status
// ==================================================================================================

#[tokio::test]
async fn test_hosted_login_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new_async().await;
    let mut config = config_for(tmp.path(), &server);
    config.delivery = DeliveryPolicy::Telegram;
    TelegramStore::new(config.telegram_path())
        .save(&TelegramConfig::new("validtoken", "111"))
        .unwrap();

    let send = server
        .mock("POST", "/botvalidtoken/sendMessage")
        .match_body(Matcher::Regex("authorize%3Fsession_id%3D".to_string()))
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/tokenUser")
        .match_query(Matcher::Any)
        .with_body(r#"{"access_token":"at_123","refresh_token":"rt_456","expires_in":1800,"token_type":"Bearer"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/tokenClient")
        .with_body(r#"{"access_token":"client_at","expires_in":1800,"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let prompter = scripted("");
    let provider = HttpOAuthProvider::new(&config, Client::new(), prompter.clone())
        .with_polling(Duration::from_millis(10), Duration::from_secs(2));
    let orch = LoginOrchestrator::new(
        &config,
        TokenVault::new(Box::new(MemoryBackend::new())),
        provider,
    );

    let before = orch.status();
    assert_eq!(before.user, TokenState::Missing);
    assert_eq!(before.client, TokenState::Missing);

    let mode = orch
        .login(&selector(&config, &server, prompter))
        .await
        .unwrap();
    assert_eq!(mode, Mode::Hosted);
    send.assert_async().await;

    let after = orch.status();
    assert!(after.user.is_valid());
    assert!(after.client.is_valid());

    assert_eq!(orch.logout().unwrap(), (Mode::Hosted, 2));
    assert_eq!(orch.status().user, TokenState::Missing);
}

#[tokio::test]
async fn test_local_login_with_invalid_credentials_fails_before_delivery() {
    let tmp = tempfile::tempdir().unwrap();
    let server = mockito::Server::new_async().await;
    let config = config_for(tmp.path(), &server);
    std::fs::write(config.credentials_path(), "not json").unwrap();

    let prompter = scripted("");
    let orch = LoginOrchestrator::new(
        &config,
        TokenVault::new(Box::new(MemoryBackend::new())),
        HttpOAuthProvider::new(&config, Client::new(), prompter.clone()),
    );

    let err = orch
        .login(&selector(&config, &server, prompter))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Invalid { .. }));
}

#[test]
fn test_status_with_unavailable_vault_reports_instead_of_failing() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_config_dir(tmp.path());
    let orch = LoginOrchestrator::new(
        &config,
        TokenVault::new(Box::new(MemoryBackend::unavailable())),
        HttpOAuthProvider::new(&config, Client::new(), scripted("")),
    );

    let status = orch.status();
    assert_eq!(status.mode, Mode::Hosted);
    assert!(matches!(status.user, TokenState::Unreadable(_)));
    assert!(orch.logout().is_err());
}
