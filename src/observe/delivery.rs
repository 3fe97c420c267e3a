// src/observe/delivery.rs

//! The fixed delivery context for change callbacks.
//!
//! Observation loops never call user callbacks themselves. They hand them to
//! a [`Delivery`], which owns one background worker draining a FIFO queue.
//! Callback work therefore never stalls a polling loop, and callbacks for one
//! path run in the order their changes were detected.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Callback invoked once per detected change.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

enum DeliveryMessage {
    Changed {
        path: String,
        callback: ChangeCallback,
    },
    /// Completes once every message queued before it has been handled.
    Barrier(oneshot::Sender<()>),
}

/// Handle to the delivery worker. Cheap to clone; the worker exits once every
/// handle has been dropped.
#[derive(Clone)]
pub struct Delivery {
    tx: mpsc::UnboundedSender<DeliveryMessage>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl Delivery {
    /// Spawn the delivery worker on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<DeliveryMessage>();

        tokio::spawn(async move {
            debug!("delivery loop started");

            while let Some(message) = rx.recv().await {
                match message {
                    DeliveryMessage::Changed { path, callback } => {
                        debug!(path = %path, "delivering change notification");
                        // The worker serves every path, so a callback panic stays here.
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                            error!(
                                path = %path,
                                panic = %panic_message(payload.as_ref()),
                                "change callback panicked"
                            );
                        }
                    }
                    DeliveryMessage::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }

            debug!("delivery loop finished (channel closed)");
        });

        Self { tx }
    }

    /// Queue `callback` for execution on the delivery worker.
    pub fn deliver(&self, path: &str, callback: ChangeCallback) {
        let message = DeliveryMessage::Changed {
            path: path.to_string(),
            callback,
        };
        if self.tx.send(message).is_err() {
            warn!(path = %path, "delivery loop closed; dropping change notification");
        }
    }

    /// Wait until every callback queued before this call has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(DeliveryMessage::Barrier(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// A path's changed-callback bound to the delivery context it must run on.
///
/// This is what providers receive when asked to build a task; calling
/// [`ChangeNotifier::notify`] is the whole of "fire changed".
#[derive(Clone)]
pub struct ChangeNotifier {
    path: String,
    callback: ChangeCallback,
    delivery: Delivery,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ChangeNotifier {
    pub fn new(path: impl Into<String>, delivery: Delivery, callback: ChangeCallback) -> Self {
        Self {
            path: path.into(),
            callback,
            delivery,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dispatch the callback once, asynchronously.
    pub fn notify(&self) {
        self.delivery.deliver(&self.path, Arc::clone(&self.callback));
    }
}
