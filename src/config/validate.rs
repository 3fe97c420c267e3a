// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use url::Url;

use crate::config::model::{ConfigFile, ProviderConfig, RawConfigFile};
use crate::errors::{RemoteWatchError, Result};
use crate::observe::normalize_path;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RemoteWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.provider, raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_watches(cfg)?;
    validate_timings(cfg)?;
    validate_providers(cfg)?;
    validate_watches(cfg)?;
    Ok(())
}

fn ensure_has_watches(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.is_empty() {
        return Err(RemoteWatchError::ConfigError(
            "config must contain at least one [[watch]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_timings(cfg: &RawConfigFile) -> Result<()> {
    let timings = cfg.config.timings()?;

    let non_zero = [
        ("poll_interval", timings.revision.interval),
        ("poll_failure_backoff", timings.revision.failure_backoff),
        ("cursor_retry_delay", timings.cursor.cursor_retry_delay),
        ("longpoll_failure_backoff", timings.cursor.failure_backoff),
        ("request_timeout", timings.request_timeout),
        ("longpoll_timeout", timings.longpoll_timeout),
    ];

    for (name, value) in non_zero {
        if value == Duration::ZERO {
            return Err(RemoteWatchError::ConfigError(format!(
                "[config].{name} must be greater than zero"
            )));
        }
    }

    Ok(())
}

fn validate_providers(cfg: &RawConfigFile) -> Result<()> {
    for (name, provider) in cfg.provider.iter() {
        match provider {
            ProviderConfig::Webdav(webdav) => {
                check_http_url(name, "url", &webdav.url)?;
                if webdav.password.is_some() && webdav.username.is_none() {
                    return Err(RemoteWatchError::ConfigError(format!(
                        "provider '{}' sets a password but no username",
                        name
                    )));
                }
            }
            ProviderConfig::Dropbox(dropbox) => {
                check_http_url(name, "api_url", &dropbox.api_url)?;
                check_http_url(name, "notify_url", &dropbox.notify_url)?;
            }
        }
    }
    Ok(())
}

fn check_http_url(provider: &str, key: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| {
        RemoteWatchError::ConfigError(format!(
            "provider '{}' has an invalid {} '{}': {}",
            provider, key, value, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(RemoteWatchError::ConfigError(format!(
            "provider '{}' {} must be an http(s) URL (got '{}')",
            provider, key, value
        )));
    }

    Ok(())
}

fn validate_watches(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashSet<(&str, String)> = HashSet::new();

    for watch in cfg.watch.iter() {
        if !cfg.provider.contains_key(&watch.provider) {
            return Err(RemoteWatchError::UnknownProvider(format!(
                "watch on '{}' refers to unknown provider '{}'",
                watch.path, watch.provider
            )));
        }

        let path = normalize_path(&watch.path);
        if !seen.insert((watch.provider.as_str(), path.clone())) {
            return Err(RemoteWatchError::ConfigError(format!(
                "path '{}' is watched more than once on provider '{}'",
                path, watch.provider
            )));
        }
    }

    Ok(())
}
