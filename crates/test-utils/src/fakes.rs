//! Scripted stand-ins for the observation seams.
//!
//! Each scripted source answers from a queue. Once the queue is empty the
//! next request signals `wait_drained` and then never completes, which leaves
//! the task parked in a cancellable wait until the test stops it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use remotewatch::errors::{ObserveError, ObserveResult};
use remotewatch::observe::{
    BoxFuture, ChangeCallback, ChangeFeed, ChangeNotifier, LongPollReply, ObservationProvider,
    ObservationTask, RevisionSource, TaskControl,
};
use remotewatch::types::{ObservationScope, TaskState};

/// Callback that counts its invocations.
pub fn counting_callback() -> (ChangeCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let callback: ChangeCallback = {
        let count = Arc::clone(&count);
        Arc::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    };
    (callback, count)
}

/// Callback that appends `label` to a shared log.
pub fn labelled_callback(label: &str, log: &Arc<Mutex<Vec<String>>>) -> ChangeCallback {
    let label = label.to_string();
    let log = Arc::clone(log);
    Arc::new(move || {
        log.lock().unwrap().push(label.clone());
    })
}

fn transient() -> ObserveError {
    ObserveError::Transport("scripted failure".to_string())
}

/// A [`RevisionSource`] answering from a fixed list of tags.
pub struct ScriptedRevisionSource {
    script: Mutex<VecDeque<ObserveResult<String>>>,
    calls: AtomicUsize,
    drained: Notify,
}

impl ScriptedRevisionSource {
    pub fn new(script: Vec<ObserveResult<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// `Some(tag)` answers with the tag, `None` with a transport failure.
    pub fn from_tags(tags: &[Option<&str>]) -> Self {
        Self::new(
            tags.iter()
                .map(|tag| tag.map(str::to_string).ok_or_else(transient))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Resolves once a request arrived after the script ran out.
    pub async fn wait_drained(&self) {
        self.drained.notified().await;
    }
}

impl RevisionSource for ScriptedRevisionSource {
    fn fetch_tag<'a>(&'a self, _path: &'a str) -> BoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    self.drained.notify_one();
                    std::future::pending().await
                }
            }
        })
    }
}

/// A [`ChangeFeed`] answering from scripted cursors and long-poll replies.
pub struct ScriptedChangeFeed {
    cursors: Mutex<VecDeque<ObserveResult<String>>>,
    replies: Mutex<VecDeque<ObserveResult<LongPollReply>>>,
    polled: Mutex<Vec<String>>,
    cursor_requests: AtomicUsize,
    drained: Notify,
}

impl ScriptedChangeFeed {
    pub fn new(
        cursors: Vec<ObserveResult<String>>,
        replies: Vec<ObserveResult<LongPollReply>>,
    ) -> Self {
        Self {
            cursors: Mutex::new(cursors.into()),
            replies: Mutex::new(replies.into()),
            polled: Mutex::new(Vec::new()),
            cursor_requests: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Cursors submitted to `longpoll`, in order.
    pub fn polled_cursors(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }

    pub fn cursor_requests(&self) -> usize {
        self.cursor_requests.load(Ordering::SeqCst)
    }

    /// Resolves once a long-poll arrived after the replies ran out.
    pub async fn wait_drained(&self) {
        self.drained.notified().await;
    }
}

/// Shorthand for a long-poll reply.
pub fn reply(changes: bool, backoff: u64) -> ObserveResult<LongPollReply> {
    Ok(LongPollReply { changes, backoff })
}

impl ChangeFeed for ScriptedChangeFeed {
    fn latest_cursor<'a>(&'a self, _path: &'a str) -> BoxFuture<'a, ObserveResult<String>> {
        Box::pin(async move {
            self.cursor_requests.fetch_add(1, Ordering::SeqCst);
            let next = self.cursors.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(transient()))
        })
    }

    fn longpoll<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, ObserveResult<LongPollReply>> {
        Box::pin(async move {
            self.polled.lock().unwrap().push(cursor.to_string());
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    self.drained.notify_one();
                    std::future::pending().await
                }
            }
        })
    }
}

/// A task that does no IO and records how the registry drives it.
pub struct ProbeTask {
    control: TaskControl,
    starts: AtomicUsize,
    stops: AtomicUsize,
    finished: AtomicBool,
}

impl ProbeTask {
    pub fn new(path: &str, scope: ObservationScope, notifier: ChangeNotifier) -> Self {
        Self {
            control: TaskControl::new(path, scope, notifier),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Whether `start` has returned.
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ObservationTask for ProbeTask {
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
        Box::pin(async move {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.control
                .run_loop(async {
                    let _ = self
                        .control
                        .guarded(std::future::pending::<ObserveResult<()>>())
                        .await;
                })
                .await;
            self.finished.store(true, Ordering::SeqCst);
        })
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.control.stop();
    }

    fn fire_changed(&self) {
        self.control.fire_changed();
    }
}

/// Provider handing out [`ProbeTask`]s and keeping a handle to each.
#[derive(Default)]
pub struct ProbeProvider {
    created: Mutex<Vec<Arc<ProbeTask>>>,
    decline: bool,
}

impl ProbeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that builds no task for any path.
    pub fn declining() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            decline: true,
        }
    }

    /// Every task created so far, oldest first.
    pub fn tasks(&self) -> Vec<Arc<ProbeTask>> {
        self.created.lock().unwrap().clone()
    }

    pub fn tasks_for(&self, path: &str) -> Vec<Arc<ProbeTask>> {
        self.tasks()
            .into_iter()
            .filter(|task| task.path() == path)
            .collect()
    }
}

impl ObservationProvider for ProbeProvider {
    fn create_observation_task(
        &self,
        path: &str,
        scope: ObservationScope,
        notifier: ChangeNotifier,
    ) -> Option<Arc<dyn ObservationTask>> {
        if self.decline {
            return None;
        }
        let task = Arc::new(ProbeTask::new(path, scope, notifier));
        self.created.lock().unwrap().push(Arc::clone(&task));
        Some(task)
    }
}
