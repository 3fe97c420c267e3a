#![cfg(unix)]

mod common;
use crate::common::builders::WatchConfigBuilder;
use crate::common::{init_tracing, with_timeout};

use std::time::Duration;

use tempfile::tempdir;

use remotewatch::change_callback;
use remotewatch::exec::{run_hook, HookInvocation};

#[tokio::test]
async fn hook_sees_provider_and_path_in_env() {
    init_tracing();

    let dir = tempdir().unwrap();
    let out = dir.path().join("hook.out");

    let invocation = HookInvocation {
        cmd: format!(
            "printf '%s|%s' \"$REMOTEWATCH_PROVIDER\" \"$REMOTEWATCH_PATH\" > '{}'",
            out.display()
        ),
        provider: "nas".to_string(),
        path: "/Camera Uploads".to_string(),
    };

    let status = with_timeout(run_hook(&invocation)).await.unwrap();
    assert!(status.success());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "nas|/Camera Uploads");
}

#[tokio::test]
async fn hook_exit_code_is_reported() {
    init_tracing();

    let invocation = HookInvocation {
        cmd: "echo failing >&2; exit 3".to_string(),
        provider: "nas".to_string(),
        path: "/docs".to_string(),
    };

    let status = with_timeout(run_hook(&invocation)).await.unwrap();
    assert_eq!(status.code(), Some(3));
}

#[tokio::test]
async fn change_callback_runs_configured_hook_with_normalized_path() {
    init_tracing();

    let dir = tempdir().unwrap();
    let out = dir.path().join("changed.out");

    let watch = WatchConfigBuilder::new("dbx", "Photos/")
        .cmd(&format!("printf '%s' \"$REMOTEWATCH_PATH\" > '{}'", out.display()))
        .build();

    let callback = change_callback(&watch);
    callback();

    with_timeout(async {
        loop {
            if let Ok(contents) = std::fs::read_to_string(&out) {
                if !contents.is_empty() {
                    break contents;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert_eq!(std::fs::read_to_string(&out).unwrap(), "/Photos");
}
