// src/exec/hook.rs

//! Runs a watch's `cmd` after a detected change.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Environment variable carrying the normalized path that changed.
pub const PATH_ENV: &str = "REMOTEWATCH_PATH";
/// Environment variable carrying the provider name from the config.
pub const PROVIDER_ENV: &str = "REMOTEWATCH_PROVIDER";

/// What a hook is run for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    pub cmd: String,
    pub provider: String,
    pub path: String,
}

/// Spawn `invocation` in the background, logging its outcome.
///
/// Must be called from within a Tokio runtime (the delivery worker is one).
pub fn spawn_hook(invocation: HookInvocation) {
    tokio::spawn(async move {
        if let Err(err) = run_hook(&invocation).await {
            error!(
                provider = %invocation.provider,
                path = %invocation.path,
                error = %err,
                "change hook failed to run"
            );
        }
    });
}

/// Run the hook to completion and return its exit status.
pub async fn run_hook(invocation: &HookInvocation) -> Result<ExitStatus> {
    info!(
        provider = %invocation.provider,
        path = %invocation.path,
        cmd = %invocation.cmd,
        "running change hook"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&invocation.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&invocation.cmd);
        c
    };

    cmd.env(PATH_ENV, &invocation.path)
        .env(PROVIDER_ENV, &invocation.provider)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning change hook for '{}'", invocation.path))?;

    // Always consume output so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        let path = invocation.path.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(path = %path, "hook stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let path = invocation.path.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(path = %path, "hook stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for change hook of '{}'", invocation.path))?;

    info!(
        path = %invocation.path,
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "change hook exited"
    );

    Ok(status)
}
