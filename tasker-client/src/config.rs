use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_FILE: &str = "tasks.db";
pub const DEFAULT_CREDENTIALS_FILE: &str = "secrets/credentials.json";
pub const DEFAULT_TOKEN_FILE: &str = "secrets/token.json";
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_OAUTH_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

/// Everything the client needs to locate its files and reach the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `None` keeps the store in memory.
    pub database_path: Option<PathBuf>,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub calendar_id: String,
    pub event_title_prefix: String,
    /// Local hour at which timed events for undated tasks start.
    pub default_event_hour: u32,
    pub default_event_minutes: i64,
    pub api_base_url: String,
    pub oauth_token_url: String,
    pub oauth_auth_url: String,
    pub max_connections: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::rooted_at(Path::new("."))
    }
}

impl ClientConfig {
    /// Default file layout under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            database_path: Some(root.join(DEFAULT_DATABASE_FILE)),
            credentials_path: root.join(DEFAULT_CREDENTIALS_FILE),
            token_path: root.join(DEFAULT_TOKEN_FILE),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            event_title_prefix: "[Task] ".to_string(),
            default_event_hour: 18,
            default_event_minutes: 60,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            oauth_token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            oauth_auth_url: DEFAULT_OAUTH_AUTH_URL.to_string(),
            max_connections: 5,
        }
    }

    /// Layout rooted at `TASKER_HOME` (or the working directory), then
    /// per-item overrides from `TASKER_DB`, `TASKER_CREDENTIALS`,
    /// `TASKER_TOKEN` and `TASKER_CALENDAR_ID`.
    pub fn from_env() -> Self {
        let root = env::var_os("TASKER_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::rooted_at(&root);

        if let Some(db) = env::var_os("TASKER_DB") {
            config.database_path = Some(PathBuf::from(db));
        }
        if let Some(creds) = env::var_os("TASKER_CREDENTIALS") {
            config.credentials_path = PathBuf::from(creds);
        }
        if let Some(token) = env::var_os("TASKER_TOKEN") {
            config.token_path = PathBuf::from(token);
        }
        if let Ok(calendar) = env::var("TASKER_CALENDAR_ID") {
            if !calendar.trim().is_empty() {
                config.calendar_id = calendar;
            }
        }

        tracing::debug!(
            "CONFIG: database={:?} credentials={:?} token={:?} calendar={}",
            config.database_path,
            config.credentials_path,
            config.token_path,
            config.calendar_id
        );
        config
    }

    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            ..Self::default()
        }
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// sqlx connection string. File databases are created on first use.
    pub fn database_url(&self) -> String {
        match &self.database_path {
            Some(path) => format!("sqlite:{}?mode=rwc", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = ClientConfig::rooted_at(Path::new("/srv/tasker"));
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/srv/tasker/tasks.db"))
        );
        assert_eq!(
            config.token_path,
            PathBuf::from("/srv/tasker/secrets/token.json")
        );
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(config.event_title_prefix, "[Task] ");
        assert_eq!(config.database_url(), "sqlite:/srv/tasker/tasks.db?mode=rwc");
    }

    #[test]
    fn test_in_memory_url() {
        assert_eq!(ClientConfig::in_memory().database_url(), "sqlite::memory:");
    }
}
