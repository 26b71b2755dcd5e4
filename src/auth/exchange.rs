// OAuth exchange against the hosted proxy or the API's own endpoints

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::provider::{LoginContext, OAuthProvider};
use super::types::{Credentials, Mode, TokenData, TokenKind};
use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::notify::{ask_required, notice, SharedPrompter};
use crate::vault::token_key;

/// Token endpoint payload, shared by the proxy and the API
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    1800
}

impl TokenResponse {
    fn into_token(self, what: &str) -> Result<TokenData> {
        if self.access_token.is_empty() {
            return Err(AuthError::invalid(what, "response does not contain access_token"));
        }
        TokenData::from_expires_in(
            self.access_token,
            self.refresh_token,
            self.expires_in,
            self.token_type,
        )
    }
}

/// Turn a non-2xx response into `AuthError::Provider`, preferring the OAuth error description
async fn provider_error(response: Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| {
            json.get("error_description")
                .or_else(|| json.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });

    tracing::error!(status = %status, message = %message, "Token request rejected");
    AuthError::Provider {
        status: status.as_u16(),
        message,
    }
}

/// Real provider: hosted logins go through the proxy, local logins talk to the API directly
pub struct HttpOAuthProvider {
    client: Client,
    proxy_url: String,
    api_url: String,
    redirect_uri: String,
    scope: String,
    prompter: SharedPrompter,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl HttpOAuthProvider {
    pub fn new(config: &Config, client: Client, prompter: SharedPrompter) -> Self {
        Self {
            client,
            proxy_url: config.proxy_url.clone(),
            api_url: config.api_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            prompter,
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
        }
    }

    /// Override how often and how long the proxy is polled
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    fn hosted_authorize_url(&self, session_id: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/authorize", self.proxy_url),
            &[
                ("session_id", session_id),
                ("scope", self.scope.as_str()),
                ("source", "cli"),
            ],
        )
        .map_err(|e| AuthError::invalid("proxy URL", e))?;
        Ok(url.into())
    }

    fn local_authorize_url(&self, credentials: &Credentials, state: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/connect/oauth2/authorize", self.api_url),
            &[
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::invalid("API URL", e))?;
        Ok(url.into())
    }

    /// Poll the proxy until the browser side of the session completes
    async fn poll_user_token(&self, session_id: &str) -> Result<TokenData> {
        let url = format!("{}/tokenUser", self.proxy_url);
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[("session_id", session_id)])
                .send()
                .await?;

            match response.status() {
                StatusCode::ACCEPTED => {
                    tracing::debug!("Sign-in still pending");
                }
                status if status.is_success() => {
                    let data: TokenResponse = response.json().await?;
                    return data.into_token("user token");
                }
                _ => return Err(provider_error(response).await),
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(AuthError::Provider {
                    status: StatusCode::REQUEST_TIMEOUT.as_u16(),
                    message: "timed out waiting for sign-in to complete".to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn hosted_client_token(&self) -> Result<TokenData> {
        let response = self
            .client
            .post(format!("{}/tokenClient", self.proxy_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        let data: TokenResponse = response.json().await?;
        data.into_token("client token")
    }

    async fn token_grant(&self, credentials: &Credentials, form: &[(&str, &str)]) -> Result<TokenData> {
        let response = self
            .client
            .post(format!("{}/connect/oauth2/token", self.api_url))
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        let data: TokenResponse = response.json().await?;
        data.into_token("token")
    }

    async fn login_hosted(&self, ctx: &LoginContext<'_>) -> Result<()> {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let url = self.hosted_authorize_url(&session_id)?;
        tracing::info!("Starting hosted sign-in");

        ctx.delivery.deliver(&url).await?;
        let user = self.poll_user_token(&session_id).await?;
        ctx.vault.store(&token_key(Mode::Hosted, TokenKind::User), &user)?;

        // The user token is already usable; a missing client token only limits catalog calls
        match self.hosted_client_token().await {
            Ok(client) => ctx
                .vault
                .store(&token_key(Mode::Hosted, TokenKind::Client), &client)?,
            Err(e) => tracing::warn!(error = %e, "Could not obtain client token"),
        }
        Ok(())
    }

    async fn login_local(&self, ctx: &LoginContext<'_>, credentials: &Credentials) -> Result<()> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self.local_authorize_url(credentials, &state)?;
        tracing::info!(client_id = %credentials.client_id, "Starting local sign-in");

        ctx.delivery.deliver(&url).await?;
        notice(
            &self.prompter,
            "After approving, copy the `code` parameter from the redirect URL.",
        )?;
        let code = ask_required(&self.prompter, "Authorization code", "Authorization code", false)?;

        let user = self
            .token_grant(
                credentials,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                ],
            )
            .await?;
        ctx.vault.store(&token_key(Mode::Local, TokenKind::User), &user)?;

        let client = self
            .token_grant(
                credentials,
                &[("grant_type", "client_credentials"), ("scope", "product.compact")],
            )
            .await?;
        ctx.vault.store(&token_key(Mode::Local, TokenKind::Client), &client)?;
        Ok(())
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    async fn login(&self, ctx: LoginContext<'_>) -> Result<()> {
        match (ctx.mode, ctx.credentials) {
            (Mode::Hosted, _) => self.login_hosted(&ctx).await,
            (Mode::Local, Some(credentials)) => self.login_local(&ctx, credentials).await,
            (Mode::Local, None) => Err(AuthError::NotFound("Credentials file".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::UrlDelivery;
    use crate::notify::{shared, ReaderPrompter};
    use crate::vault::{MemoryBackend, TokenVault};
    use mockito::Matcher;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDelivery {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UrlDelivery for RecordingDelivery {
        async fn deliver(&self, url: &str) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn provider(server: &mockito::ServerGuard, input: &str) -> HttpOAuthProvider {
        let mut config = Config::with_config_dir("/nonexistent");
        config.proxy_url = server.url();
        config.api_url = server.url();
        HttpOAuthProvider::new(
            &config,
            Client::new(),
            shared(ReaderPrompter::new(Cursor::new(input.to_string()), std::io::sink())),
        )
        .with_polling(Duration::from_millis(10), Duration::from_millis(500))
    }

    fn memory_vault() -> TokenVault {
        TokenVault::new(Box::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_hosted_login_polls_and_stores_both_tokens() {
        let mut server = mockito::Server::new_async().await;
        let pending = server
            .mock("GET", "/tokenUser")
            .match_query(Matcher::Regex("session_id=[0-9a-f]{32}".to_string()))
            .with_status(202)
            .with_body(r#"{"status":"pending"}"#)
            .expect(1)
            .create_async()
            .await;
        let done = server
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

        let vault = memory_vault();
        let delivery = RecordingDelivery::default();
        provider(&server, "")
            .login(LoginContext {
                mode: Mode::Hosted,
                credentials: None,
                delivery: &delivery,
                vault: &vault,
            })
            .await
            .unwrap();

        pending.assert_async().await;
        done.assert_async().await;

        let urls = delivery.urls.lock().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with(&format!("{}/authorize?session_id=", server.url())));
        assert!(urls[0].contains("source=cli"));

        let user = vault.load("hosted:user_token").unwrap();
        assert_eq!(user.access_token, "at_123");
        assert_eq!(user.refresh_token.as_deref(), Some("rt_456"));
        assert_eq!(vault.load("hosted:client_token").unwrap().access_token, "client_at");
    }

    #[tokio::test]
    async fn test_hosted_login_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tokenUser")
            .match_query(Matcher::Any)
            .with_status(202)
            .create_async()
            .await;

        let vault = memory_vault();
        let err = provider(&server, "")
            .with_polling(Duration::from_millis(5), Duration::from_millis(30))
            .login(LoginContext {
                mode: Mode::Hosted,
                credentials: None,
                delivery: &RecordingDelivery::default(),
                vault: &vault,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Provider { status: 408, .. }));
        assert!(vault.load("hosted:user_token").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_login_exchanges_code() {
        let mut server = mockito::Server::new_async().await;
        let code_grant = server
            .mock("POST", "/connect/oauth2/token")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc123".into()),
            ]))
            .with_body(r#"{"access_token":"user_at","refresh_token":"user_rt","expires_in":1800,"token_type":"bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let client_grant = server
            .mock("POST", "/connect/oauth2/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
            .with_body(r#"{"access_token":"client_at","expires_in":1800,"token_type":"bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let vault = memory_vault();
        let delivery = RecordingDelivery::default();
        let creds = Credentials::new("test-id", "test-secret");
        provider(&server, "abc123\n")
            .login(LoginContext {
                mode: Mode::Local,
                credentials: Some(&creds),
                delivery: &delivery,
                vault: &vault,
            })
            .await
            .unwrap();

        code_grant.assert_async().await;
        client_grant.assert_async().await;

        let url = delivery.urls.lock().unwrap()[0].clone();
        assert!(url.contains("/connect/oauth2/authorize?client_id=test-id"));
        assert!(url.contains("response_type=code"));
        assert_eq!(vault.load("local:user_token").unwrap().access_token, "user_at");
        assert_eq!(vault.load("local:client_token").unwrap().access_token, "client_at");
    }

    #[tokio::test]
    async fn test_local_login_rejection_carries_description() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/connect/oauth2/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Authorization code expired"}"#)
            .create_async()
            .await;

        let vault = memory_vault();
        let creds = Credentials::new("test-id", "test-secret");
        let err = provider(&server, "stale\n")
            .login(LoginContext {
                mode: Mode::Local,
                credentials: Some(&creds),
                delivery: &RecordingDelivery::default(),
                vault: &vault,
            })
            .await
            .unwrap_err();

        match err {
            AuthError::Provider { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Authorization code expired");
            }
            other => panic!("expected Provider error, got {:?}", other),
        }
        assert!(vault.load("local:user_token").unwrap_err().is_not_found());
    }

    #[test]
    fn test_out_of_range_expires_in_is_invalid() {
        let response: TokenResponse = serde_json::from_str(&format!(
            r#"{{"access_token":"at","expires_in":{}}}"#,
            i64::MAX
        ))
        .unwrap();
        let err = response.into_token("user token").unwrap_err();
        assert!(matches!(err, AuthError::Invalid { ref reason, .. } if reason.contains("expires_in")));
    }

    #[tokio::test]
    async fn test_hosted_login_rejects_absurd_lifetime() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tokenUser")
            .match_query(Matcher::Any)
            .with_body(format!(
                r#"{{"access_token":"at","expires_in":{},"token_type":"Bearer"}}"#,
                i64::MAX
            ))
            .create_async()
            .await;

        let vault = memory_vault();
        let err = provider(&server, "")
            .login(LoginContext {
                mode: Mode::Hosted,
                credentials: None,
                delivery: &RecordingDelivery::default(),
                vault: &vault,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Invalid { .. }));
        assert!(vault.load("hosted:user_token").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_login_blank_code_is_empty_input() {
        let server = mockito::Server::new_async().await;
        let vault = memory_vault();
        let creds = Credentials::new("test-id", "test-secret");

        let err = provider(&server, "\n")
            .login(LoginContext {
                mode: Mode::Local,
                credentials: Some(&creds),
                delivery: &RecordingDelivery::default(),
                vault: &vault,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmptyInput(_)));
    }
}
