// src/observe/revision.rs

//! Change detection by polling an opaque revision tag (WebDAV ETag).
//!
//! Each iteration asks a [`RevisionSource`] for the current tag of the
//! watched path and compares it with the last one seen:
//!
//! - first known tag: becomes the baseline, no notification;
//! - known tag followed by a different known tag: notification;
//! - anything else (same tag, or no tag because the request failed): no
//!   notification.
//!
//! Successful polls wait `interval` before the next one; failed polls wait the
//! longer `failure_backoff` so a dead server isn't hammered.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::errors::{ObserveError, ObserveResult};
use crate::observe::delivery::ChangeNotifier;
use crate::observe::task::{BoxFuture, ObservationTask, TaskControl};
use crate::types::{ObservationScope, TaskState};

/// Anything that can report the current revision tag of a remote path.
pub trait RevisionSource: Send + Sync {
    /// Fetch the tag for `path`. Any failure means "tag unknown".
    fn fetch_tag<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ObserveResult<String>>;
}

/// Fixed backoff intervals for [`RevisionTagTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionPollSettings {
    /// Wait after a poll that returned a tag.
    pub interval: Duration,
    /// Wait after a poll that could not produce a tag.
    pub failure_backoff: Duration,
}

impl Default for RevisionPollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            failure_backoff: Duration::from_secs(30),
        }
    }
}

/// Last-observed-tag bookkeeping, kept separate from the IO loop so the
/// comparison rules can be exercised directly.
#[derive(Debug, Default, Clone)]
pub struct TagTracker {
    last: Option<String>,
}

impl TagTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Record the outcome of one poll.
    ///
    /// Returns `true` exactly when a known tag replaced a different known tag.
    /// An unknown tag clears the baseline, so the next known tag only
    /// re-establishes it.
    pub fn observe(&mut self, tag: Option<String>) -> bool {
        match (&self.last, tag) {
            (Some(previous), Some(current)) if *previous != current => {
                self.last = Some(current);
                true
            }
            (_, current) => {
                self.last = current;
                false
            }
        }
    }
}

/// Polls a [`RevisionSource`] until stopped.
pub struct RevisionTagTask {
    control: TaskControl,
    source: Arc<dyn RevisionSource>,
    settings: RevisionPollSettings,
}

impl fmt::Debug for RevisionTagTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionTagTask")
            .field("control", &self.control)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RevisionTagTask {
    pub fn new(
        path: impl Into<String>,
        scope: ObservationScope,
        notifier: ChangeNotifier,
        source: Arc<dyn RevisionSource>,
        settings: RevisionPollSettings,
    ) -> Self {
        Self {
            control: TaskControl::new(path, scope, notifier),
            source,
            settings,
        }
    }

    async fn poll_loop(&self) {
        let path = self.control.path();
        let mut tracker = TagTracker::new();

        info!(
            path = %path,
            scope = %self.control.scope(),
            interval = ?self.settings.interval,
            "revision-tag observation started"
        );

        while !self.control.is_stopped() {
            let tag = match self.control.guarded(self.source.fetch_tag(path)).await {
                Ok(tag) => Some(tag),
                Err(ObserveError::Cancelled) => break,
                Err(err) if err.is_fatal() => {
                    error!(path = %path, error = %err, "credentials rejected; giving up on this path");
                    break;
                }
                Err(err) => {
                    debug!(path = %path, error = %err, "revision tag unavailable");
                    None
                }
            };

            if self.control.is_stopped() {
                break;
            }

            let backoff = if tag.is_some() {
                self.settings.interval
            } else {
                self.settings.failure_backoff
            };

            if tracker.observe(tag) {
                info!(path = %path, tag = ?tracker.last(), "revision tag changed");
                if !self.control.fire_changed_unless_stopped() {
                    break;
                }
            }

            if !self.control.sleep(backoff).await {
                break;
            }
        }

        debug!(path = %path, "revision-tag observation finished");
    }
}

impl ObservationTask for RevisionTagTask {
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
