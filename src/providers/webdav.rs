// src/providers/webdav.rs

//! WebDAV backend: observes paths by polling their ETag with `PROPFIND`.

use std::fmt;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use roxmltree::{Document, Node};
use secrecy::{ExposeSecret, Secret};
use tracing::trace;
use url::Url;

use crate::errors::{ObserveError, ObserveResult, RemoteWatchError, Result};
use crate::observe::{
    BoxFuture, ChangeNotifier, ObservationProvider, ObservationTask, RevisionPollSettings,
    RevisionSource, RevisionTagTask,
};
use crate::providers::check_status;
use crate::types::ObservationScope;

/// Minimal all-properties `PROPFIND` request document.
pub const PROPFIND_BODY: &str =
    "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<D:propfind xmlns:D=\"DAV:\">\n<D:allprop/></D:propfind>";

/// HTTP Basic credentials for a WebDAV server.
#[derive(Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: Option<Secret<String>>,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Issues depth-1 `PROPFIND` requests below a base collection URL.
#[derive(Debug, Clone)]
pub struct WebDavClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<BasicCredentials>,
}

impl WebDavClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        credentials: Option<BasicCredentials>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            RemoteWatchError::ConfigError(format!("invalid WebDAV URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteWatchError::ConfigError(format!(
                "WebDAV URL '{}' cannot have paths appended",
                base_url
            )));
        }

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// URL of a normalized remote path, with each segment percent-encoded.
    pub fn url_of(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    async fn propfind_tag(&self, path: &str) -> ObserveResult<String> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| ObserveError::Transport(e.to_string()))?;
        let url = self.url_of(path);
        trace!(url = %url, "PROPFIND");

        let mut request = self
            .http
            .request(method, url)
            .header("Depth", "1")
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .body(PROPFIND_BODY);

        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(
                &credentials.username,
                credentials.password.as_ref().map(|p| p.expose_secret()),
            );
        }

        let response = check_status(request.send().await?)?;
        let body = response.text().await?;

        parse_etag(&body).ok_or_else(|| {
            ObserveError::MalformedResponse("no getetag in multistatus response".to_string())
        })
    }
}

impl RevisionSource for WebDavClient {
    fn fetch_tag<'a>(&'a self, path: &'a str) -> BoxFuture<'a, ObserveResult<String>> {
        Box::pin(self.propfind_tag(path))
    }
}

/// Case-insensitive match on an element's local name.
fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name().to_ascii_lowercase().ends_with(name)
}

/// Extract the revision tag from a `PROPFIND` multistatus reply.
///
/// Walks multistatus → first response → propstat → prop → getetag and returns
/// the first non-empty value. Namespace prefixes are ignored.
pub fn parse_etag(xml: &str) -> Option<String> {
    let doc = Document::parse(xml).ok()?;
    let root = doc.root_element();

    let multistatus = if is_element(&root, "multistatus") {
        root
    } else {
        root.descendants().find(|n| is_element(n, "multistatus"))?
    };

    let response = multistatus
        .children()
        .find(|n| is_element(n, "response"))?;

    response
        .children()
        .filter(|n| is_element(n, "propstat"))
        .flat_map(|propstat| propstat.children().filter(|n| is_element(n, "prop")))
        .flat_map(|prop| prop.children().filter(|n| is_element(n, "getetag")))
        .find_map(|etag| {
            etag.text()
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
        })
}

/// A WebDAV server as an [`ObservationProvider`].
#[derive(Debug, Clone)]
pub struct WebDavProvider {
    client: Arc<WebDavClient>,
    settings: RevisionPollSettings,
}

impl WebDavProvider {
    pub fn new(client: WebDavClient, settings: RevisionPollSettings) -> Self {
        Self {
            client: Arc::new(client),
            settings,
        }
    }
}

impl ObservationProvider for WebDavProvider {
    fn create_observation_task(
        &self,
        path: &str,
        scope: ObservationScope,
        notifier: ChangeNotifier,
    ) -> Option<Arc<dyn ObservationTask>> {
        let source: Arc<dyn RevisionSource> = self.client.clone();
        Some(Arc::new(RevisionTagTask::new(
            path,
            scope,
            notifier,
            source,
            self.settings,
        )))
    }
}
