// src/observe/task.rs

//! The observation task contract and the lifecycle plumbing shared by every
//! task variant.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{ObserveError, ObserveResult};
use crate::observe::delivery::ChangeNotifier;
use crate::types::{ObservationScope, TaskState};

/// Boxed `Send` future, used at the trait seams in this module.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One running watcher for one path.
///
/// Implemented by [`RevisionTagTask`](crate::observe::RevisionTagTask) and
/// [`CursorLongPollTask`](crate::observe::CursorLongPollTask). The registry
/// drives tasks purely through this trait.
pub trait ObservationTask: Send + Sync {
    /// Normalized path this task watches.
    fn path(&self) -> &str;

    fn scope(&self) -> ObservationScope;

    fn state(&self) -> TaskState;

    /// Run the observation loop on the calling worker until `stop` is called.
    ///
    /// Returns immediately if the task was stopped before it began.
    fn start(&self) -> BoxFuture<'_, ()>;

    /// Request termination. Idempotent and safe to call from any thread,
    /// before, during or after `start`.
    fn stop(&self);

    /// Dispatch the changed-callback once on the delivery context.
    fn fire_changed(&self);
}

/// Lifecycle state, cancellation and notification shared by task variants.
pub struct TaskControl {
    path: String,
    scope: ObservationScope,
    notifier: ChangeNotifier,
    state: AtomicU8,
    cancel: CancellationToken,
    /// Held while stopping and while a loop queues a notification, so no
    /// loop notification can be queued once `stop` has returned.
    fire_gate: Mutex<()>,
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("path", &self.path)
            .field("scope", &self.scope)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskControl {
    pub fn new(path: impl Into<String>, scope: ObservationScope, notifier: ChangeNotifier) -> Self {
        Self {
            path: path.into(),
            scope,
            notifier,
            state: AtomicU8::new(TaskState::Created.as_u8()),
            cancel: CancellationToken::new(),
            fire_gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scope(&self) -> ObservationScope {
        self.scope
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Mark the task stopped and wake anything waiting on it.
    ///
    /// Returns `false` if the task was already stopped.
    pub fn stop(&self) -> bool {
        let previous = {
            let _gate = self.fire_gate.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = self.state.swap(TaskState::Stopped.as_u8(), Ordering::AcqRel);
            self.cancel.cancel();
            previous
        };

        let was_live = TaskState::from_u8(previous) != TaskState::Stopped;
        if was_live {
            debug!(path = %self.path, "stop requested");
        }
        was_live
    }

    /// Dispatch the callback regardless of state (external change hints).
    pub fn fire_changed(&self) {
        self.notifier.notify();
    }

    /// Dispatch the callback for a change the loop itself detected.
    ///
    /// Returns `false`, without notifying, if the task has been stopped.
    pub fn fire_changed_unless_stopped(&self) -> bool {
        let _gate = self.fire_gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            return false;
        }
        self.notifier.notify();
        true
    }

    /// Run `body` as the task's loop, handling the state transitions around it.
    ///
    /// `body` is not polled at all if the task was stopped before this call.
    pub async fn run_loop<F>(&self, body: F)
    where
        F: Future<Output = ()>,
    {
        let began = self
            .state
            .compare_exchange(
                TaskState::Created.as_u8(),
                TaskState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if !began {
            debug!(path = %self.path, state = ?self.state(), "task not started (already stopped)");
            return;
        }

        body.await;

        // The loop only returns on stop or on a fatal error; both end here.
        self.stop();
    }

    /// Await `request`, giving up as soon as the task is stopped.
    ///
    /// Dropping the request future aborts the underlying HTTP call, so a
    /// stopped worker never sits out the remote timeout window.
    pub async fn guarded<T, F>(&self, request: F) -> ObserveResult<T>
    where
        F: Future<Output = ObserveResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ObserveError::Cancelled),
            result = request => result,
        }
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` if the full duration elapsed and the task is still live.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
        }
    }
}
