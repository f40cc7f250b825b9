use super::auth::{AuthPrompt, OAuthTokenProvider, TokenProvider};
use super::{CalendarApi, CalendarError, EventPayload, RemoteEvent};
use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;

const MAX_ERROR_LEN: usize = 240;

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Google Calendar v3 over HTTPS.
pub struct GoogleCalendar {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GoogleCalendar {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    /// OAuth-backed client using the configured credential and token files.
    pub fn from_config(config: &ClientConfig, prompt: Arc<dyn AuthPrompt>) -> Self {
        let tokens = Arc::new(OAuthTokenProvider::new(config, prompt));
        Self::new(config.api_base_url.clone(), tokens)
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]`, segments percent-encoded.
    fn events_url(
        &self,
        calendar_id: &str,
        event_id: Option<&str>,
    ) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CalendarError::Transport(format!("invalid API base URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CalendarError::Transport("API base URL cannot be a base".into()))?;
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        payload: Option<&EventPayload>,
    ) -> Result<reqwest::Response, CalendarError> {
        let token = self.tokens.access_token().await?;
        tracing::debug!("CALENDAR: {} {}", method, url);

        let mut builder = self.http.request(method, url).bearer_auth(token);
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(CalendarError::Credentials(
                "calendar service rejected the access token".into(),
            ));
        }
        Ok(resp)
    }

    async fn read_event(resp: reqwest::Response) -> Result<RemoteEvent, CalendarError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::http_error(resp).await);
        }
        resp.json::<RemoteEvent>()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))
    }

    async fn http_error(resp: reqwest::Response) -> CalendarError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
            _ => truncate_error(&body),
        };
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            message
        };
        CalendarError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

fn truncate_error(message: &str) -> String {
    let mut out = message.trim().replace(['\n', '\r'], " ");
    if out.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn ensure_authorized(&self) -> Result<(), CalendarError> {
        self.tokens.access_token().await.map(|_| ())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError> {
        let url = self.events_url(calendar_id, None)?;
        let resp = self.request(Method::POST, url, Some(payload)).await?;
        let event = Self::read_event(resp).await?;
        tracing::info!("CALENDAR: Created event {}", event.id);
        Ok(event)
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &EventPayload,
    ) -> Result<RemoteEvent, CalendarError> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        let resp = self.request(Method::PATCH, url, Some(payload)).await?;
        let event = Self::read_event(resp).await?;
        tracing::info!("CALENDAR: Patched event {}", event.id);
        Ok(event)
    }

    async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<RemoteEvent>, CalendarError> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        let resp = self.request(Method::GET, url, None).await?;
        match Self::read_event(resp).await {
            Ok(event) => Ok(Some(event)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
