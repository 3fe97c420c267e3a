// src/providers/mod.rs

//! Storage backends that can be observed.
//!
//! - [`webdav`]: revision-tag polling over `PROPFIND`.
//! - [`dropbox`]: cursor long-polling over the `list_folder` API.
//!
//! [`build_providers`] turns the `[provider.<name>]` tables of a validated
//! config into ready-to-use [`ObservationProvider`]s sharing one HTTP client.

pub mod dropbox;
pub mod webdav;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::{ConfigFile, ProviderConfig, Timings};
use crate::errors::{ObserveError, ObserveResult, Result};
use crate::observe::ObservationProvider;

pub use dropbox::{DropboxClient, DropboxProvider};
pub use webdav::{BasicCredentials, WebDavClient, WebDavProvider};

/// Map an HTTP status to the observation error taxonomy.
pub(crate) fn check_status(response: reqwest::Response) -> ObserveResult<reqwest::Response> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ObserveError::Unauthorized(status.as_u16()));
    }
    if !status.is_success() {
        return Err(ObserveError::Transport(format!(
            "{} returned HTTP {}",
            response.url(),
            status
        )));
    }

    Ok(response)
}

/// Shared HTTP client with the configured default request timeout.
pub fn build_http_client(timings: &Timings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timings.request_timeout)
        .user_agent(concat!("remotewatch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Build one provider per `[provider.<name>]` table.
pub fn build_providers(
    cfg: &ConfigFile,
    http: &reqwest::Client,
) -> Result<BTreeMap<String, Arc<dyn ObservationProvider>>> {
    let timings = cfg.config.timings()?;
    let mut providers: BTreeMap<String, Arc<dyn ObservationProvider>> = BTreeMap::new();

    for (name, provider) in cfg.provider.iter() {
        let built: Arc<dyn ObservationProvider> = match provider {
            ProviderConfig::Webdav(webdav) => {
                let credentials = webdav.username.as_ref().map(|username| BasicCredentials {
                    username: username.clone(),
                    password: webdav.password.clone(),
                });
                let client = WebDavClient::new(http.clone(), &webdav.url, credentials)?;
                Arc::new(WebDavProvider::new(client, timings.revision))
            }
            ProviderConfig::Dropbox(dropbox) => {
                if dropbox.token.is_none() {
                    warn!(provider = %name, "dropbox provider has no token; its watches will be skipped");
                }
                let client = dropbox.token.clone().map(|token| {
                    DropboxClient::new(
                        http.clone(),
                        token,
                        &dropbox.api_url,
                        &dropbox.notify_url,
                        timings.longpoll_timeout,
                    )
                });
                Arc::new(DropboxProvider::new(client, timings.cursor))
            }
        };

        debug!(provider = %name, kind = provider.kind(), "provider ready");
        providers.insert(name.clone(), built);
    }

    Ok(providers)
}
