// src/observe/provider.rs

use std::sync::Arc;

use crate::observe::delivery::ChangeNotifier;
use crate::observe::task::ObservationTask;
use crate::types::ObservationScope;

/// Capability every storage backend implements so the registry can watch its
/// paths.
///
/// The provider supplies its own transport and credentials; the registry only
/// hands over what to watch and how to report changes.
pub trait ObservationProvider: Send + Sync {
    /// Build (but do not start) a task for the normalized `path`.
    ///
    /// Returning `None` means this provider cannot observe the path right now;
    /// the registry then registers nothing.
    ///
    /// Called without any registry lock held, so an implementation may query
    /// the registry or send it `changed_notification`s.
    fn create_observation_task(
        &self,
        path: &str,
        scope: ObservationScope,
        notifier: ChangeNotifier,
    ) -> Option<Arc<dyn ObservationTask>>;
}
