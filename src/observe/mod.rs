// src/observe/mod.rs

//! Remote change observation.
//!
//! This module is responsible for:
//! - The [`ObservationTask`] contract and its two strategies: revision-tag
//!   polling ([`RevisionTagTask`]) and cursor long-polling
//!   ([`CursorLongPollTask`]).
//! - The [`ObservationRegistry`], which keeps one live task per path and runs
//!   each on its own worker.
//! - The [`Delivery`] context every change callback is dispatched on.
//!
//! It does **not** speak HTTP itself; the strategies talk to a
//! [`RevisionSource`] or [`ChangeFeed`], implemented in `crate::providers`.

pub mod cursor;
pub mod cursor_cache;
pub mod delivery;
pub mod path;
pub mod provider;
pub mod registry;
pub mod revision;
pub mod task;

pub use cursor::{ChangeFeed, CursorLongPollTask, CursorPollSettings, LongPollReply};
pub use cursor_cache::CursorCache;
pub use delivery::{ChangeCallback, ChangeNotifier, Delivery};
pub use path::normalize_path;
pub use provider::ObservationProvider;
pub use registry::ObservationRegistry;
pub use revision::{RevisionPollSettings, RevisionSource, RevisionTagTask, TagTracker};
pub use task::{BoxFuture, ObservationTask, TaskControl};
