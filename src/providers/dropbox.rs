// src/providers/dropbox.rs

//! Dropbox backend: observes paths by long-polling `list_folder` cursors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::errors::ObserveResult;
use crate::observe::{
    BoxFuture, ChangeFeed, ChangeNotifier, CursorCache, CursorLongPollTask, CursorPollSettings,
    LongPollReply, ObservationProvider, ObservationTask,
};
use crate::providers::check_status;
use crate::types::ObservationScope;

pub const DEFAULT_API_URL: &str = "https://api.dropboxapi.com";
pub const DEFAULT_NOTIFY_URL: &str = "https://notify.dropboxapi.com";

const LATEST_CURSOR_ENDPOINT: &str = "2/files/list_folder/get_latest_cursor";
const LONGPOLL_ENDPOINT: &str = "2/files/list_folder/longpoll";

#[derive(Debug, Serialize)]
struct LatestCursorRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct LatestCursorResponse {
    cursor: String,
}

#[derive(Debug, Serialize)]
struct LongPollRequest<'a> {
    cursor: &'a str,
}

/// Talks to the two `list_folder` endpoints a cursor task needs.
#[derive(Clone)]
pub struct DropboxClient {
    http: reqwest::Client,
    token: Secret<String>,
    api_url: String,
    notify_url: String,
    longpoll_timeout: Duration,
}

impl fmt::Debug for DropboxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxClient")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("notify_url", &self.notify_url)
            .field("longpoll_timeout", &self.longpoll_timeout)
            .finish()
    }
}

impl DropboxClient {
    pub fn new(
        http: reqwest::Client,
        token: Secret<String>,
        api_url: &str,
        notify_url: &str,
        longpoll_timeout: Duration,
    ) -> Self {
        Self {
            http,
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
            notify_url: notify_url.trim_end_matches('/').to_string(),
            longpoll_timeout,
        }
    }

    async fn request_latest_cursor(&self, path: &str) -> ObserveResult<String> {
        let url = format!("{}/{}", self.api_url, LATEST_CURSOR_ENDPOINT);
        trace!(url = %url, path = %path, "requesting latest cursor");

        let response = self
            .http
            .post(url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(&LatestCursorRequest { path })
            .send()
            .await?;

        let body: LatestCursorResponse = check_status(response)?.json().await?;
        Ok(body.cursor)
    }

    async fn request_longpoll(&self, cursor: &str) -> ObserveResult<LongPollReply> {
        let url = format!("{}/{}", self.notify_url, LONGPOLL_ENDPOINT);
        trace!(url = %url, "long-polling");

        // No Authorization header: the long-poll endpoint rejects it.
        let response = self
            .http
            .post(url)
            .timeout(self.longpoll_timeout)
            .json(&LongPollRequest { cursor })
            .send()
            .await?;

        let reply: LongPollReply = check_status(response)?.json().await?;
        Ok(reply)
    }
}

impl ChangeFeed for DropboxClient {
    fn latest_cursor<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ObserveResult<String>> {
        Box::pin(self.request_latest_cursor(path))
    }

    fn longpoll<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, ObserveResult<LongPollReply>> {
        Box::pin(self.request_longpoll(cursor))
    }
}

/// A Dropbox account as an [`ObservationProvider`].
///
/// Owns the [`CursorCache`] shared by all of its tasks, so re-registering a
/// path resumes from the last cursor this provider saw for it.
#[derive(Debug, Clone)]
pub struct DropboxProvider {
    client: Option<Arc<DropboxClient>>,
    cache: CursorCache,
    settings: CursorPollSettings,
}

impl DropboxProvider {
    /// `client` is `None` when no token is configured; such a provider
    /// declines every path.
    pub fn new(client: Option<DropboxClient>, settings: CursorPollSettings) -> Self {
        Self::with_cache(client, CursorCache::new(), settings)
    }

    pub fn with_cache(
        client: Option<DropboxClient>,
        cache: CursorCache,
        settings: CursorPollSettings,
    ) -> Self {
        Self {
            client: client.map(Arc::new),
            cache,
            settings,
        }
    }

    pub fn cursor_cache(&self) -> &CursorCache {
        &self.cache
    }
}

impl ObservationProvider for DropboxProvider {
    fn create_observation_task(
        &self,
        path: &str,
        scope: ObservationScope,
        notifier: ChangeNotifier,
    ) -> Option<Arc<dyn ObservationTask>> {
        let Some(client) = &self.client else {
            warn!(path = %path, "dropbox provider has no token; cannot observe");
            return None;
        };

        let feed: Arc<dyn ChangeFeed> = client.clone();
        Some(Arc::new(CursorLongPollTask::new(
            path,
            scope,
            notifier,
            feed,
            self.cache.clone(),
            self.settings,
        )))
    }
}
