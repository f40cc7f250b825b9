use super::CalendarError;
use crate::config::{ClientConfig, CALENDAR_SCOPE};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Tokens this close to expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const AUTH_FLOW_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// Source of bearer tokens for calendar requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, CalendarError>;

    /// Called when the service rejected the last token.
    async fn invalidate(&self) {}
}

/// A fixed bearer token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, CalendarError> {
        Ok(self.0.clone())
    }
}

/// Shows the user the authorisation URL during the interactive flow.
pub trait AuthPrompt: Send + Sync {
    fn open(&self, auth_url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientSecrets {
    /// Accepts the downloaded OAuth client file (`{"installed": {...}}` or
    /// `{"web": {...}}`) as well as a flat object.
    pub fn from_json(raw: &str) -> Result<Self, CalendarError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| CalendarError::Credentials(format!("malformed client secrets: {}", e)))?;
        let inner = value
            .get("installed")
            .or_else(|| value.get("web"))
            .cloned()
            .unwrap_or(value);
        let secrets: ClientSecrets = serde_json::from_value(inner)
            .map_err(|e| CalendarError::Credentials(format!("malformed client secrets: {}", e)))?;

        if secrets.client_id.trim().is_empty() || secrets.client_secret.trim().is_empty() {
            return Err(CalendarError::Credentials(
                "client secrets are missing client_id or client_secret".into(),
            ));
        }
        Ok(secrets)
    }

    pub fn load(path: &Path) -> Result<Self, CalendarError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CalendarError::Credentials(format!(
                "client secrets not readable at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }
}

/// On-disk token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at > now + EXPIRY_MARGIN_SECS
    }

    /// `None` when the file is missing or unreadable as a token.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("AUTH: Cannot read token cache {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("AUTH: Ignoring corrupt token cache {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CalendarError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            std::fs::write(path, content)
        };
        write().map_err(|e| {
            CalendarError::Credentials(format!(
                "cannot write token cache {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh: Option<&str>) -> StoredToken {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        StoredToken {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now().timestamp() + lifetime,
        }
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google OAuth for an installed application: cached token, one refresh
/// attempt, then the loopback browser flow.
pub struct OAuthTokenProvider {
    http: Client,
    credentials_path: PathBuf,
    token_path: PathBuf,
    token_url: String,
    auth_url: String,
    prompt: Arc<dyn AuthPrompt>,
    flow_timeout: Duration,
    cached: Mutex<Option<StoredToken>>,
}

impl OAuthTokenProvider {
    pub fn new(config: &ClientConfig, prompt: Arc<dyn AuthPrompt>) -> Self {
        Self {
            http: Client::new(),
            credentials_path: config.credentials_path.clone(),
            token_path: config.token_path.clone(),
            token_url: config.oauth_token_url.clone(),
            auth_url: config.oauth_auth_url.clone(),
            prompt,
            flow_timeout: AUTH_FLOW_TIMEOUT,
            cached: Mutex::new(None),
        }
    }

    pub fn with_flow_timeout(mut self, timeout: Duration) -> Self {
        self.flow_timeout = timeout;
        self
    }

    async fn refresh(
        &self,
        secrets: &ClientSecrets,
        refresh_token: &str,
    ) -> Result<StoredToken, CalendarError> {
        tracing::debug!("AUTH: Refreshing access token");
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(token_endpoint_unreachable)?;

        let token = read_token_response(resp).await?;
        Ok(token.into_stored(Some(refresh_token)))
    }

    async fn authorize_interactively(
        &self,
        secrets: &ClientSecrets,
    ) -> Result<StoredToken, CalendarError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|e| {
            CalendarError::Credentials(format!("cannot open loopback listener: {}", e))
        })?;
        let addr = listener
            .local_addr()
            .map_err(|e| CalendarError::Credentials(e.to_string()))?;
        let redirect_uri = format!("http://{}/", addr);
        let state = Uuid::new_v4().simple().to_string();

        let auth_url = Url::parse_with_params(
            &self.auth_url,
            [
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| CalendarError::Credentials(format!("invalid authorization URL: {}", e)))?;

        tracing::info!("AUTH: Waiting for browser authorization on {}", redirect_uri);
        self.prompt.open(auth_url.as_str());

        let code = tokio::time::timeout(self.flow_timeout, wait_for_code(&listener, &state))
            .await
            .map_err(|_| CalendarError::Credentials("authorization timed out".into()))??;

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(token_endpoint_unreachable)?;

        let token = read_token_response(resp).await?;
        tracing::info!("AUTH: Authorization complete");
        Ok(token.into_stored(None))
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn access_token(&self) -> Result<String, CalendarError> {
        // Held across the refresh so concurrent syncs authorise once
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = StoredToken::load(&self.token_path);
        }

        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let secrets = ClientSecrets::load(&self.credentials_path)?;
        let refresh_token = cached.as_ref().and_then(|t| t.refresh_token.clone());

        let token = match refresh_token {
            Some(refresh_token) => match self.refresh(&secrets, &refresh_token).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(
                        "AUTH: Token refresh failed ({}), starting interactive authorization",
                        e
                    );
                    self.authorize_interactively(&secrets).await?
                }
            },
            None => self.authorize_interactively(&secrets).await?,
        };

        token.save(&self.token_path)?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_mut() {
            token.expires_at = 0;
        }
    }
}

async fn read_token_response(resp: reqwest::Response) -> Result<TokenResponse, CalendarError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CalendarError::Credentials(format_oauth_error(
            status.as_u16(),
            &body,
        )));
    }
    resp.json::<TokenResponse>()
        .await
        .map_err(|e| CalendarError::Credentials(format!("malformed token response: {}", e)))
}

fn token_endpoint_unreachable(e: reqwest::Error) -> CalendarError {
    CalendarError::Credentials(format!("token endpoint unreachable: {}", e))
}

fn format_oauth_error(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    match serde_json::from_str::<TokenErrorResponse>(trimmed) {
        Ok(TokenErrorResponse {
            error,
            error_description: Some(desc),
        }) => format!("token endpoint returned HTTP {}: {} ({})", status, desc, error),
        Ok(TokenErrorResponse { error, .. }) => {
            format!("token endpoint returned HTTP {}: {}", status, error)
        }
        Err(_) => format!("token endpoint returned HTTP {}", status),
    }
}

/// Accept loopback connections until one carries the authorization redirect.
async fn wait_for_code(listener: &TcpListener, state: &str) -> Result<String, CalendarError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| CalendarError::Credentials(format!("loopback accept failed: {}", e)))?;

        let target = match read_request_target(&mut stream).await {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!("AUTH: Ignoring unreadable loopback request: {}", e);
                continue;
            }
        };
        let params: HashMap<String, String> = Url::parse(&format!("http://localhost{}", target))
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default();

        if let Some(error) = params.get("error") {
            respond(
                &mut stream,
                "200 OK",
                "Authorization failed. You can close this window.",
            )
            .await;
            return Err(CalendarError::Credentials(format!(
                "authorization denied: {}",
                error
            )));
        }

        let Some(code) = params.get("code") else {
            // e.g. /favicon.ico
            respond(&mut stream, "404 Not Found", "Not found").await;
            continue;
        };

        if params.get("state").map(String::as_str) != Some(state) {
            respond(&mut stream, "400 Bad Request", "Invalid state.").await;
            return Err(CalendarError::Credentials(
                "authorization state mismatch".into(),
            ));
        }

        respond(
            &mut stream,
            "200 OK",
            "Authorization complete. You can close this window.",
        )
        .await;
        return Ok(code.clone());
    }
}

async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    Ok(target.to_string())
}

async fn respond(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!("{}\n", message);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("AUTH: Failed to answer loopback request: {}", e);
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tasker_core::SyncError;
    use tempfile::TempDir;

    const SECRETS: &str = r#"{"installed": {"client_id": "cid", "client_secret": "csecret",
        "redirect_uris": ["http://localhost"]}}"#;

    struct NeverPrompt;

    impl AuthPrompt for NeverPrompt {
        fn open(&self, auth_url: &str) {
            panic!("unexpected interactive authorization: {}", auth_url);
        }
    }

    /// Plays the browser: follows the redirect back to the loopback listener.
    struct BrowserPrompt {
        opened: std::sync::Mutex<Vec<String>>,
    }

    impl AuthPrompt for BrowserPrompt {
        fn open(&self, auth_url: &str) {
            self.opened.lock().unwrap().push(auth_url.to_string());
            let url = Url::parse(auth_url).unwrap();
            let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
            let callback = format!(
                "{}?code=auth-code&state={}",
                params["redirect_uri"], params["state"]
            );
            tokio::spawn(async move {
                let _ = reqwest::get(callback).await;
            });
        }
    }

    fn config_in(dir: &TempDir, token_url: String) -> ClientConfig {
        let mut config = ClientConfig::rooted_at(dir.path());
        config.oauth_token_url = token_url;
        std::fs::create_dir_all(dir.path().join("secrets")).unwrap();
        std::fs::write(&config.credentials_path, SECRETS).unwrap();
        config
    }

    #[test]
    fn test_client_secrets_layouts() {
        let installed = ClientSecrets::from_json(SECRETS).unwrap();
        assert_eq!(installed.client_id, "cid");

        let web = ClientSecrets::from_json(r#"{"web": {"client_id": "w", "client_secret": "s"}}"#)
            .unwrap();
        assert_eq!(web.client_id, "w");

        let flat =
            ClientSecrets::from_json(r#"{"client_id": "f", "client_secret": "s"}"#).unwrap();
        assert_eq!(flat.client_secret, "s");

        assert!(matches!(
            ClientSecrets::from_json(r#"{"installed": {"client_id": "", "client_secret": "s"}}"#),
            Err(CalendarError::Credentials(_))
        ));
        assert!(matches!(
            ClientSecrets::load(Path::new("/nonexistent/credentials.json")),
            Err(CalendarError::Credentials(_))
        ));
    }

    #[test]
    fn test_token_freshness_margin() {
        let token = StoredToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: 1_000,
        };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(940));
    }

    #[tokio::test]
    async fn test_fresh_cached_token_is_reused() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let token_mock = server.mock("POST", "/token").expect(0).create_async().await;
        let config = config_in(&dir, format!("{}/token", server.url()));

        StoredToken {
            access_token: "cached".into(),
            refresh_token: Some("r".into()),
            expires_at: Utc::now().timestamp() + 3600,
        }
        .save(&config.token_path)
        .unwrap();

        let provider = OAuthTokenProvider::new(&config, Arc::new(NeverPrompt));
        assert_eq!(provider.access_token().await.unwrap(), "cached");
        assert_eq!(provider.access_token().await.unwrap(), "cached");
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_saved() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "keep-me".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;
        let config = config_in(&dir, format!("{}/token", server.url()));

        StoredToken {
            access_token: "stale".into(),
            refresh_token: Some("keep-me".into()),
            expires_at: Utc::now().timestamp() - 10,
        }
        .save(&config.token_path)
        .unwrap();

        let provider = OAuthTokenProvider::new(&config, Arc::new(NeverPrompt));
        assert_eq!(provider.access_token().await.unwrap(), "fresh");
        refresh_mock.assert_async().await;

        let saved = StoredToken::load(&config.token_path).unwrap();
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
        assert!(saved.is_fresh(Utc::now().timestamp()));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_interactive_flow() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant", "error_description": "Token has been revoked."}"#)
            .create_async()
            .await;
        let exchange_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "granted", "expires_in": 3600, "refresh_token": "new-refresh"}"#)
            .create_async()
            .await;
        let config = config_in(&dir, format!("{}/token", server.url()));

        StoredToken {
            access_token: "stale".into(),
            refresh_token: Some("revoked".into()),
            expires_at: 0,
        }
        .save(&config.token_path)
        .unwrap();

        let prompt = Arc::new(BrowserPrompt {
            opened: std::sync::Mutex::new(Vec::new()),
        });
        let provider = OAuthTokenProvider::new(&config, prompt.clone())
            .with_flow_timeout(Duration::from_secs(10));

        assert_eq!(provider.access_token().await.unwrap(), "granted");
        refresh_mock.assert_async().await;
        exchange_mock.assert_async().await;

        let opened = prompt.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].contains("access_type=offline"));
        assert!(
            opened[0].contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcalendar.events")
        );

        let saved = StoredToken::load(&config.token_path).unwrap();
        assert_eq!(saved.refresh_token.as_deref(), Some("new-refresh"));
    }

    #[tokio::test]
    async fn test_malformed_exchange_response_is_credentials_error() {
        let dir = TempDir::new().unwrap();
        let mut server = mockito::Server::new_async().await;
        let exchange_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>captive portal</html>")
            .create_async()
            .await;
        let config = config_in(&dir, format!("{}/token", server.url()));

        let prompt = Arc::new(BrowserPrompt {
            opened: std::sync::Mutex::new(Vec::new()),
        });
        let provider = OAuthTokenProvider::new(&config, prompt)
            .with_flow_timeout(Duration::from_secs(10));

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, CalendarError::Credentials(_)), "got {:?}", err);
        assert!(SyncError::from(err).is_credentials());
        exchange_mock.assert_async().await;
        assert!(StoredToken::load(&config.token_path).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_credentials_error() {
        let dir = TempDir::new().unwrap();
        // Nothing listens on the discard port
        let config = config_in(&dir, "http://127.0.0.1:9/token".to_string());
        StoredToken {
            access_token: "stale".into(),
            refresh_token: Some("r".into()),
            expires_at: 0,
        }
        .save(&config.token_path)
        .unwrap();

        let prompt = Arc::new(BrowserPrompt {
            opened: std::sync::Mutex::new(Vec::new()),
        });
        let provider = OAuthTokenProvider::new(&config, prompt)
            .with_flow_timeout(Duration::from_secs(10));

        assert!(matches!(
            provider.access_token().await,
            Err(CalendarError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_client_secrets_is_credentials_error() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::rooted_at(dir.path());
        let provider = OAuthTokenProvider::new(&config, Arc::new(NeverPrompt));
        assert!(matches!(
            provider.access_token().await,
            Err(CalendarError::Credentials(_))
        ));
    }
}
