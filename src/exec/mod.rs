// src/exec/mod.rs

//! Process execution for change hooks.
//!
//! A `[[watch]]` entry may carry a `cmd`; after each detected change it runs
//! through the platform shell with the changed path and provider name in the
//! environment. Hooks run detached from the delivery worker, so a slow hook
//! never holds up later notifications.

pub mod hook;

pub use hook::{run_hook, spawn_hook, HookInvocation, PATH_ENV, PROVIDER_ENV};
