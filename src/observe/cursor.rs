// src/observe/cursor.rs

//! Change detection by long-polling a change stream (Dropbox).
//!
//! The task first obtains a cursor for its path (from the shared
//! [`CursorCache`] or from the provider), then repeatedly submits it to the
//! long-poll endpoint. The server holds each request until something changes
//! or its own timeout passes, and answers with a `changes` flag and an
//! optional backoff in seconds.
//!
//! The long-poll reply carries no new cursor, so after reporting a change the
//! task asks for the latest cursor again. Only a successful refresh moves the
//! working cursor and the cache entry forward.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::errors::{ObserveError, ObserveResult};
use crate::observe::cursor_cache::CursorCache;
use crate::observe::delivery::ChangeNotifier;
use crate::observe::task::{BoxFuture, ObservationTask, TaskControl};
use crate::types::{ObservationScope, TaskState};

/// Body of a long-poll reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LongPollReply {
    pub changes: bool,
    /// Seconds the client must wait before the next long-poll. Absent means 0.
    #[serde(default)]
    pub backoff: u64,
}

/// The two change-stream endpoints a cursor task needs.
pub trait ChangeFeed: Send + Sync {
    /// Ask for a cursor pointing at the current end of `path`'s change stream.
    fn latest_cursor<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ObserveResult<String>>;

    /// Block until changes exist past `cursor` or the server times out.
    fn longpoll<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, ObserveResult<LongPollReply>>;
}

/// Client-side delays for [`CursorLongPollTask`]. The server decides the
/// backoff between successful long-polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPollSettings {
    /// Wait between attempts to obtain the starting cursor.
    pub cursor_retry_delay: Duration,
    /// Wait after a long-poll request that failed outright.
    pub failure_backoff: Duration,
}

impl Default for CursorPollSettings {
    fn default() -> Self {
        Self {
            cursor_retry_delay: Duration::from_secs(5),
            failure_backoff: Duration::from_secs(30),
        }
    }
}

pub struct CursorLongPollTask {
    control: TaskControl,
    feed: Arc<dyn ChangeFeed>,
    cache: CursorCache,
    settings: CursorPollSettings,
}

impl fmt::Debug for CursorLongPollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorLongPollTask")
            .field("control", &self.control)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CursorLongPollTask {
    pub fn new(
        path: impl Into<String>,
        scope: ObservationScope,
        notifier: ChangeNotifier,
        feed: Arc<dyn ChangeFeed>,
        cache: CursorCache,
        settings: CursorPollSettings,
    ) -> Self {
        Self {
            control: TaskControl::new(path, scope, notifier),
            feed,
            cache,
            settings,
        }
    }

    /// Cached cursor, or a fresh one fetched with unbounded retries.
    ///
    /// `None` means the task was stopped (or credentials were rejected)
    /// before a cursor could be obtained.
    async fn acquire_cursor(&self) -> Option<String> {
        let path = self.control.path();

        if let Some(cursor) = self.cache.get(path) {
            debug!(path = %path, "resuming from cached cursor");
            return Some(cursor);
        }

        let mut attempt: u32 = 0;
        loop {
            if self.control.is_stopped() {
                return None;
            }
            attempt += 1;

            match self.control.guarded(self.feed.latest_cursor(path)).await {
                Ok(cursor) => {
                    self.cache.store(path, &cursor);
                    return Some(cursor);
                }
                Err(ObserveError::Cancelled) => return None,
                Err(err) if err.is_fatal() => {
                    error!(path = %path, error = %err, "credentials rejected; giving up on this path");
                    return None;
                }
                Err(err) => {
                    warn!(path = %path, attempt, error = %err, "failed to obtain starting cursor; retrying");
                    if !self.control.sleep(self.settings.cursor_retry_delay).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Fetch a replacement cursor after a reported change.
    ///
    /// Returns `Err` only for outcomes that must end the loop.
    async fn refresh_cursor(&self, cursor: &mut String) -> Result<(), ObserveError> {
        let path = self.control.path();

        match self.control.guarded(self.feed.latest_cursor(path)).await {
            Ok(next) => {
                self.cache.store(path, &next);
                *cursor = next;
                Ok(())
            }
            Err(err) if matches!(err, ObserveError::Cancelled) || err.is_fatal() => Err(err),
            Err(err) => {
                warn!(path = %path, error = %err, "cursor refresh failed; keeping previous cursor");
                Ok(())
            }
        }
    }

    async fn poll_loop(&self) {
        let path = self.control.path();

        info!(path = %path, scope = %self.control.scope(), "cursor long-poll observation started");

        let Some(mut cursor) = self.acquire_cursor().await else {
            debug!(path = %path, "cursor long-poll observation finished before first poll");
            return;
        };

        while !self.control.is_stopped() {
            let reply = match self.control.guarded(self.feed.longpoll(&cursor)).await {
                Ok(reply) => reply,
                Err(ObserveError::Cancelled) => break,
                Err(err) if err.is_fatal() => {
                    error!(path = %path, error = %err, "long-poll rejected; giving up on this path");
                    break;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "long-poll failed");
                    if !self.control.sleep(self.settings.failure_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            if self.control.is_stopped() {
                break;
            }

            debug!(path = %path, changes = reply.changes, backoff = reply.backoff, "long-poll returned");

            if reply.changes {
                info!(path = %path, "remote changes reported");
                if !self.control.fire_changed_unless_stopped() {
                    break;
                }

                if let Err(err) = self.refresh_cursor(&mut cursor).await {
                    if err.is_fatal() {
                        error!(path = %path, error = %err, "credentials rejected; giving up on this path");
                    }
                    break;
                }
            }

            if reply.backoff > 0
                && !self
                    .control
                    .sleep(Duration::from_secs(reply.backoff))
                    .await
            {
                break;
            }
        }

        debug!(path = %path, "cursor long-poll observation finished");
    }
}

impl ObservationTask for CursorLongPollTask {
    fn path(&self) -> &str {
        self.control.path()
    }

    fn scope(&self) -> ObservationScope {
        self.control.scope()
    }

    fn state(&self) -> TaskState {
        self.control.state()
    }

    fn start(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.control.run_loop(self.poll_loop()))
    }

    fn stop(&self) {
        self.control.stop();
    }

    fn fire_changed(&self) {
        self.control.fire_changed();
    }
}
