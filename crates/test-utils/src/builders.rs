#![allow(dead_code)]

use std::collections::BTreeMap;

use secrecy::Secret;

use remotewatch::config::{
    ConfigFile, ConfigSection, DropboxProviderConfig, ProviderConfig, RawConfigFile, WatchConfig,
    WebDavProviderConfig,
};
use remotewatch::providers::dropbox::{DEFAULT_API_URL, DEFAULT_NOTIFY_URL};
use remotewatch::types::ObservationScope;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                provider: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_webdav(mut self, name: &str, url: &str) -> Self {
        self.config.provider.insert(
            name.to_string(),
            ProviderConfig::Webdav(WebDavProviderConfig {
                url: url.to_string(),
                username: None,
                password: None,
            }),
        );
        self
    }

    pub fn with_webdav_login(mut self, name: &str, url: &str, username: &str, password: &str) -> Self {
        self.config.provider.insert(
            name.to_string(),
            ProviderConfig::Webdav(WebDavProviderConfig {
                url: url.to_string(),
                username: Some(username.to_string()),
                password: Some(Secret::new(password.to_string())),
            }),
        );
        self
    }

    pub fn with_dropbox(mut self, name: &str, token: Option<&str>) -> Self {
        self.config.provider.insert(
            name.to_string(),
            ProviderConfig::Dropbox(DropboxProviderConfig {
                token: token.map(|t| Secret::new(t.to_string())),
                api_url: DEFAULT_API_URL.to_string(),
                notify_url: DEFAULT_NOTIFY_URL.to_string(),
            }),
        );
        self
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.config.watch.push(watch);
        self
    }

    pub fn with_poll_interval(mut self, value: &str) -> Self {
        self.config.config.poll_interval = value.to_string();
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `WatchConfig`.
pub struct WatchConfigBuilder {
    watch: WatchConfig,
}

impl WatchConfigBuilder {
    pub fn new(provider: &str, path: &str) -> Self {
        Self {
            watch: WatchConfig {
                provider: provider.to_string(),
                path: path.to_string(),
                scope: ObservationScope::Children,
                cmd: None,
            },
        }
    }

    pub fn scope(mut self, scope: ObservationScope) -> Self {
        self.watch.scope = scope;
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.watch.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> WatchConfig {
        self.watch
    }
}
