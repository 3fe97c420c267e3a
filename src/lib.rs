// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod observe;
pub mod providers;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile, ProviderConfig, WatchConfig};
use crate::exec::{spawn_hook, HookInvocation};
use crate::observe::{normalize_path, ChangeCallback, ObservationRegistry};
use crate::providers::{build_http_client, build_providers};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - HTTP client + providers
/// - the observation registry
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let timings = cfg.config.timings()?;
    let http = build_http_client(&timings)?;
    let providers = build_providers(&cfg, &http)?;

    let registry = ObservationRegistry::new();

    for watch in cfg.watch.iter() {
        let provider = providers
            .get(&watch.provider)
            .with_context(|| format!("provider '{}' was not built", watch.provider))?;

        registry.register(
            &watch.path,
            watch.scope,
            provider.as_ref(),
            change_callback(watch),
        );
    }

    info!(
        watched = registry.len(),
        configured = cfg.watch.len(),
        "remotewatch started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;

    info!("shutdown requested");
    registry.shutdown().await;
    Ok(())
}

/// Callback for one `[[watch]]`: report on stdout and run its hook, if any.
pub fn change_callback(watch: &WatchConfig) -> ChangeCallback {
    let provider = watch.provider.clone();
    let path = normalize_path(&watch.path);
    let cmd = watch.cmd.clone();

    Arc::new(move || {
        info!(provider = %provider, path = %path, "remote change detected");
        println!("changed {provider} {path}");

        if let Some(cmd) = &cmd {
            spawn_hook(HookInvocation {
                cmd: cmd.clone(),
                provider: provider.clone(),
                path: path.clone(),
            });
        }
    })
}

/// Simple dry-run output: print providers and watches.
fn print_dry_run(cfg: &ConfigFile) {
    println!("remotewatch dry-run");
    println!("  config.poll_interval = {}", cfg.config.poll_interval);
    println!(
        "  config.poll_failure_backoff = {}",
        cfg.config.poll_failure_backoff
    );
    println!("  config.cursor_retry_delay = {}", cfg.config.cursor_retry_delay);
    println!(
        "  config.longpoll_failure_backoff = {}",
        cfg.config.longpoll_failure_backoff
    );
    println!();

    println!("providers ({}):", cfg.provider.len());
    for (name, provider) in cfg.provider.iter() {
        println!("  - {name} ({})", provider.kind());
        match provider {
            ProviderConfig::Webdav(webdav) => {
                println!("      url: {}", webdav.url);
                if let Some(ref username) = webdav.username {
                    println!("      username: {username}");
                }
            }
            ProviderConfig::Dropbox(dropbox) => {
                println!("      api_url: {}", dropbox.api_url);
                println!("      notify_url: {}", dropbox.notify_url);
                println!("      token: {}", if dropbox.token.is_some() { "set" } else { "missing" });
            }
        }
    }
    println!();

    println!("watches ({}):", cfg.watch.len());
    for watch in cfg.watch.iter() {
        println!("  - {}:{}", watch.provider, normalize_path(&watch.path));
        println!("      scope: {}", watch.scope);
        if let Some(ref cmd) = watch.cmd {
            println!("      cmd: {cmd}");
        }
    }

    debug!("dry-run complete (no requests sent)");
}
