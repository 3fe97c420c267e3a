// src/config/mod.rs

//! Configuration loading and validation for remotewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Parse duration strings (`duration.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate providers, watches and timings (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, DropboxProviderConfig, ProviderConfig, RawConfigFile, Timings,
    WatchConfig, WebDavProviderConfig,
};
