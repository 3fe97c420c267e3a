// src/observe/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::observe::delivery::{ChangeCallback, ChangeNotifier, Delivery};
use crate::observe::path::normalize_path;
use crate::observe::provider::ObservationProvider;
use crate::observe::task::ObservationTask;
use crate::types::ObservationScope;

/// Registry entry: the task plus the worker running its loop.
struct RegisteredTask {
    task: Arc<dyn ObservationTask>,
    worker: JoinHandle<()>,
}

/// Owns every active observation task, keyed by normalized path.
///
/// - At most one task per path: registering a path that is already watched
///   stops and evicts the old task before the new one is installed.
/// - Every task loop runs on its own Tokio task, so one slow path never delays
///   another.
/// - All change callbacks run on the registry's single [`Delivery`] worker.
///
/// Must be created inside a Tokio runtime. Dropping the registry stops every
/// task it still owns.
pub struct ObservationRegistry {
    tasks: Mutex<HashMap<String, RegisteredTask>>,
    delivery: Delivery,
}

impl fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationRegistry")
            .field("paths", &self.paths())
            .finish_non_exhaustive()
    }
}

impl Default for ObservationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            delivery: Delivery::spawn(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegisteredTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start watching `path` through `provider`.
    ///
    /// Any task already registered for the same normalized path is stopped and
    /// removed before the new one is installed. If the provider builds no
    /// task, the old one is still removed and nothing is registered.
    /// Does not block: the loop starts on a fresh worker, and the new task is
    /// not started until the old one has been stopped.
    pub fn register<P>(
        &self,
        path: &str,
        scope: ObservationScope,
        provider: &P,
        on_changed: ChangeCallback,
    ) where
        P: ObservationProvider + ?Sized,
    {
        let path = normalize_path(path);

        // Built outside the lock: providers may call back into the registry.
        let notifier = ChangeNotifier::new(path.clone(), self.delivery.clone(), on_changed);
        let created = provider.create_observation_task(&path, scope, notifier);

        let mut tasks = self.lock();

        if let Some(previous) = tasks.remove(&path) {
            debug!(path = %path, "replacing existing observation");
            previous.task.stop();
        }

        let Some(task) = created else {
            info!(path = %path, "provider declined to observe path");
            return;
        };

        let worker = {
            let task = Arc::clone(&task);
            tokio::spawn(async move {
                task.start().await;
            })
        };

        info!(path = %path, scope = %scope, "observation registered");
        tasks.insert(path, RegisteredTask { task, worker });
    }

    /// Stop and forget the task for `path`. Returns whether one was registered.
    pub fn unregister(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let removed = self.lock().remove(&path);

        match removed {
            Some(entry) => {
                entry.task.stop();
                info!(path = %path, "observation unregistered");
                true
            }
            None => false,
        }
    }

    /// Stop and forget every task.
    pub fn clear(&self) {
        let drained: Vec<(String, RegisteredTask)> = self.lock().drain().collect();

        for (path, entry) in &drained {
            debug!(path = %path, "stopping observation");
            entry.task.stop();
        }

        if !drained.is_empty() {
            info!(count = drained.len(), "all observations cleared");
        }
    }

    /// Like [`clear`](Self::clear), but also waits for every worker to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, RegisteredTask)> = self.lock().drain().collect();

        for (_, entry) in &drained {
            entry.task.stop();
        }

        for (path, entry) in drained {
            if let Err(err) = entry.worker.await {
                warn!(path = %path, error = %err, "observation worker ended abnormally");
            }
        }

        self.delivery.flush().await;
        info!("observation registry shut down");
    }

    /// Provider-driven hint that `path` changed (e.g. a push notification).
    ///
    /// Fires the registered task's callback on the delivery worker. Returns
    /// `false` if nothing is registered for the path.
    pub fn changed_notification(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let task = self.lock().get(&path).map(|entry| Arc::clone(&entry.task));

        match task {
            Some(task) => {
                debug!(path = %path, "external change notification");
                task.fire_changed();
                true
            }
            None => {
                debug!(path = %path, "change notification for unobserved path ignored");
                false
            }
        }
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.lock().contains_key(&normalize_path(path))
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait until every callback queued so far has run.
    pub async fn flush(&self) {
        self.delivery.flush().await;
    }
}

impl Drop for ObservationRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
