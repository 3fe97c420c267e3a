// src/config/model.rs

use std::collections::BTreeMap;

use secrecy::Secret;
use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::errors::{RemoteWatchError, Result};
use crate::observe::{CursorPollSettings, RevisionPollSettings};
use crate::types::ObservationScope;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// poll_interval = "20s"
///
/// [provider.nas]
/// kind = "webdav"
/// url = "https://dav.example.com/remote.php/webdav"
/// username = "alice"
/// password = "hunter2"
///
/// [provider.dbx]
/// kind = "dropbox"
/// token = "sl.XXXX"
///
/// [[watch]]
/// provider = "nas"
/// path = "Documents/"
///
/// [[watch]]
/// provider = "dbx"
/// path = "/Camera Uploads"
/// scope = "descendants"
/// cmd = "notify-send \"$REMOTEWATCH_PATH changed\""
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Timing knobs from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Providers from `[provider.<name>]`, keyed by name.
    #[serde(default)]
    pub provider: BTreeMap<String, ProviderConfig>,

    /// Watched paths from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Validated configuration. Only obtainable through `ConfigFile::try_from`
/// (see `validate.rs`) or [`ConfigFile::new_unchecked`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub provider: BTreeMap<String, ProviderConfig>,
    pub watch: Vec<WatchConfig>,
}

impl ConfigFile {
    /// Build without validation. Callers are expected to have validated the
    /// parts already.
    pub fn new_unchecked(
        config: ConfigSection,
        provider: BTreeMap<String, ProviderConfig>,
        watch: Vec<WatchConfig>,
    ) -> Self {
        Self {
            config,
            provider,
            watch,
        }
    }
}

/// `[config]` section. Durations are strings like `"500ms"`, `"20s"`, `"5m"`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// WebDAV: wait after a poll that returned a revision tag.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// WebDAV: wait after a poll that failed to produce a tag.
    #[serde(default = "default_poll_failure_backoff")]
    pub poll_failure_backoff: String,

    /// Dropbox: wait between attempts to obtain a starting cursor.
    #[serde(default = "default_cursor_retry_delay")]
    pub cursor_retry_delay: String,

    /// Dropbox: wait after a long-poll request that failed outright.
    #[serde(default = "default_longpoll_failure_backoff")]
    pub longpoll_failure_backoff: String,

    /// Timeout for ordinary requests (PROPFIND, latest cursor).
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// Timeout for a single long-poll request. Must exceed the time the
    /// server may hold the request open.
    #[serde(default = "default_longpoll_timeout")]
    pub longpoll_timeout: String,
}

fn default_poll_interval() -> String {
    "20s".to_string()
}

fn default_poll_failure_backoff() -> String {
    "30s".to_string()
}

fn default_cursor_retry_delay() -> String {
    "5s".to_string()
}

fn default_longpoll_failure_backoff() -> String {
    "30s".to_string()
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_longpoll_timeout() -> String {
    "150s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            poll_failure_backoff: default_poll_failure_backoff(),
            cursor_retry_delay: default_cursor_retry_delay(),
            longpoll_failure_backoff: default_longpoll_failure_backoff(),
            request_timeout: default_request_timeout(),
            longpoll_timeout: default_longpoll_timeout(),
        }
    }
}

/// `[config]` with every duration parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub revision: RevisionPollSettings,
    pub cursor: CursorPollSettings,
    pub request_timeout: std::time::Duration,
    pub longpoll_timeout: std::time::Duration,
}

impl ConfigSection {
    /// Parse every duration field, naming the offending key on failure.
    pub fn timings(&self) -> Result<Timings> {
        let field = |name: &str, value: &str| {
            parse_duration(value).map_err(|e| {
                RemoteWatchError::ConfigError(format!("[config].{name}: {e}"))
            })
        };

        Ok(Timings {
            revision: RevisionPollSettings {
                interval: field("poll_interval", &self.poll_interval)?,
                failure_backoff: field("poll_failure_backoff", &self.poll_failure_backoff)?,
            },
            cursor: CursorPollSettings {
                cursor_retry_delay: field("cursor_retry_delay", &self.cursor_retry_delay)?,
                failure_backoff: field("longpoll_failure_backoff", &self.longpoll_failure_backoff)?,
            },
            request_timeout: field("request_timeout", &self.request_timeout)?,
            longpoll_timeout: field("longpoll_timeout", &self.longpoll_timeout)?,
        })
    }
}

/// `[provider.<name>]` table, selected by its `kind` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    Webdav(WebDavProviderConfig),
    Dropbox(DropboxProviderConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::Webdav(_) => "webdav",
            ProviderConfig::Dropbox(_) => "dropbox",
        }
    }
}

/// `kind = "webdav"`: polled for ETag changes.
#[derive(Debug, Clone, Deserialize)]
pub struct WebDavProviderConfig {
    /// Base URL of the DAV collection; watched paths are appended to it.
    pub url: String,

    /// HTTP Basic username. Without it requests are sent unauthenticated.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<Secret<String>>,
}

/// `kind = "dropbox"`: long-polled for cursor changes.
#[derive(Debug, Clone, Deserialize)]
pub struct DropboxProviderConfig {
    /// OAuth bearer token. Without it the provider observes nothing.
    #[serde(default)]
    pub token: Option<Secret<String>>,

    #[serde(default = "default_dropbox_api_url")]
    pub api_url: String,

    #[serde(default = "default_dropbox_notify_url")]
    pub notify_url: String,
}

fn default_dropbox_api_url() -> String {
    crate::providers::dropbox::DEFAULT_API_URL.to_string()
}

fn default_dropbox_notify_url() -> String {
    crate::providers::dropbox::DEFAULT_NOTIFY_URL.to_string()
}

/// One `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Name of a `[provider.<name>]` table.
    pub provider: String,

    /// Remote path; normalized before registration.
    pub path: String,

    #[serde(default)]
    pub scope: ObservationScope,

    /// Optional shell command run after each detected change.
    #[serde(default)]
    pub cmd: Option<String>,
}
