//! Application-level configuration loading: issue status tags, groupier list, cache,
//! ticket tracker and upload settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TESTROOM_BACK_CONFIG_PATH";
/// Jira caps summaries at 255 characters.
pub const TICKET_SUMMARY_MAX_CHARS: usize = 255;

#[derive(Debug, Clone)]
/// Immutable runtime configuration passed to the services at construction time.
pub struct AppConfig {
    status_tags: Vec<String>,
    groupier_emails: Vec<String>,
    cache: CacheConfig,
    tickets: TicketConfig,
    uploads_dir: PathBuf,
}

/// Which cache implementation backs the read-through layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Bounded in-process map.
    Memory,
    /// Shared Redis instance.
    Redis,
    /// Caching disabled.
    None,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Cache backend selection and entry lifetimes.
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Maximum number of entries held by the in-process cache.
    pub capacity: usize,
    /// Lifetime applied by `set` when the caller passes none.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "default_ttl_secs")]
    pub default_ttl: Duration,
    /// Lifetime of cached room issue lists and leaderboards.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "room_ttl_secs")]
    pub room_ttl: Duration,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            capacity: 1_000,
            default_ttl: Duration::from_secs(60),
            room_ttl: Duration::from_secs(5),
            redis_url: None,
            redis_prefix: "testroom".into(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// External ticket tracker settings. Credentials come from the environment.
pub struct TicketConfig {
    /// Base URL of the tracker; the bridge is disabled when absent.
    pub base_url: Option<String>,
    pub project_key: String,
    pub issue_type: String,
    /// Upper bound for a single tracker call.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            project_key: "QA".into(),
            issue_type: "Bug".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tags = app_config.status_tags.len(),
                        groupiers = app_config.groupier_emails.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build a configuration with explicit tags and groupier list, other settings defaulted.
    pub fn with_rules(status_tags: Vec<String>, groupier_emails: Vec<String>) -> Self {
        RawConfig {
            status_tags,
            groupier_emails,
            ..RawConfig::default()
        }
        .into()
    }

    #[cfg(test)]
    pub fn set_ticket_timeout(&mut self, timeout: Duration) {
        self.tickets.timeout = timeout;
    }

    /// Status tags given to rooms created without their own set.
    pub fn status_tags(&self) -> &[String] {
        &self.status_tags
    }

    /// Whether `email` belongs to the configured groupier list (case-insensitive).
    pub fn is_groupier_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        !email.is_empty() && self.groupier_emails.iter().any(|entry| *entry == email)
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn tickets(&self) -> &TicketConfig {
        &self.tickets
    }

    /// Directory receiving uploaded issue attachments.
    pub fn uploads_dir(&self) -> &PathBuf {
        &self.uploads_dir
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    status_tags: Vec<String>,
    groupier_emails: Vec<String>,
    cache: CacheConfig,
    tickets: TicketConfig,
    uploads_dir: PathBuf,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            status_tags: default_status_tags(),
            groupier_emails: Vec::new(),
            cache: CacheConfig::default(),
            tickets: TicketConfig::default(),
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut status_tags = Vec::new();
        for tag in value.status_tags.iter().map(|tag| tag.trim()) {
            if tag.is_empty() || tag == crate::dao::models::STATUS_OPEN {
                continue;
            }
            if !status_tags.iter().any(|existing| existing == tag) {
                status_tags.push(tag.to_string());
            }
        }

        let groupier_emails = value
            .groupier_emails
            .iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        let mut cache = value.cache;
        if cache.room_ttl.is_zero() {
            cache.room_ttl = CacheConfig::default().room_ttl;
            warn!(
                fallback_secs = cache.room_ttl.as_secs(),
                "cache.room_ttl_secs must be positive; using the default"
            );
        }

        let mut tickets = value.tickets;
        if tickets.timeout.is_zero() {
            tickets.timeout = TicketConfig::default().timeout;
            warn!(
                fallback_secs = tickets.timeout.as_secs(),
                "tickets.timeout_secs must be positive; using the default"
            );
        }

        Self {
            status_tags,
            groupier_emails,
            cache,
            tickets,
            uploads_dir: value.uploads_dir,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_status_tags() -> Vec<String> {
    ["in_progress", "fixed", "wont_fix", "duplicate"]
        .into_iter()
        .map(String::from)
        .collect()
}
