mod common;
use crate::common::fakes::counting_callback;
use crate::common::{init_tracing, with_timeout};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use secrecy::Secret;
use serde_json::json;

use remotewatch::errors::ObserveError;
use remotewatch::observe::{
    ChangeFeed, ChangeNotifier, CursorPollSettings, Delivery, LongPollReply, ObservationProvider,
    ObservationRegistry,
};
use remotewatch::providers::{DropboxClient, DropboxProvider};
use remotewatch::types::ObservationScope;

const CURSOR_PATH: &str = "/2/files/list_folder/get_latest_cursor";
const LONGPOLL_PATH: &str = "/2/files/list_folder/longpoll";

fn client_for(server: &ServerGuard) -> DropboxClient {
    // A trailing slash on the base URLs must not double up.
    let base = format!("{}/", server.url());
    DropboxClient::new(
        reqwest::Client::new(),
        Secret::new("tok".to_string()),
        &base,
        &base,
        Duration::from_secs(5),
    )
}

#[test]
fn longpoll_reply_backoff_defaults_to_zero() {
    let reply: LongPollReply = serde_json::from_value(json!({ "changes": true })).unwrap();
    assert_eq!(
        reply,
        LongPollReply {
            changes: true,
            backoff: 0
        }
    );

    let reply: LongPollReply =
        serde_json::from_value(json!({ "changes": false, "backoff": 60 })).unwrap();
    assert_eq!(reply.backoff, 60);
}

#[test]
fn client_debug_hides_token() {
    let client = DropboxClient::new(
        reqwest::Client::new(),
        Secret::new("super-secret-token".to_string()),
        "https://api.example.com",
        "https://notify.example.com",
        Duration::from_secs(150),
    );
    let rendered = format!("{client:?}");
    assert!(!rendered.contains("super-secret-token"));
    assert!(rendered.contains("api.example.com"));
}

#[tokio::test]
async fn latest_cursor_posts_path_with_bearer_token() {
    init_tracing();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", CURSOR_PATH)
        .match_header("authorization", "Bearer tok")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "path": "/docs" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"cursor":"C0"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let cursor = with_timeout(client.latest_cursor("/docs")).await.unwrap();

    assert_eq!(cursor, "C0");
    mock.assert_async().await;
}

#[tokio::test]
async fn longpoll_posts_cursor_without_authorization() {
    init_tracing();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", LONGPOLL_PATH)
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({ "cursor": "C0" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"changes":false,"backoff":30}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let reply = with_timeout(client.longpoll("C0")).await.unwrap();

    assert_eq!(
        reply,
        LongPollReply {
            changes: false,
            backoff: 30
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn responses_map_to_observe_errors() {
    init_tracing();

    let mut server = Server::new_async().await;
    server
        .mock("POST", CURSOR_PATH)
        .with_status(401)
        .with_body(r#"{"error_summary":"invalid_access_token/"}"#)
        .create_async()
        .await;
    server
        .mock("POST", LONGPOLL_PATH)
        .match_body(Matcher::Json(json!({ "cursor": "garbled" })))
        .with_status(200)
        .with_body("this is not json")
        .create_async()
        .await;
    server
        .mock("POST", LONGPOLL_PATH)
        .match_body(Matcher::Json(json!({ "cursor": "expired" })))
        .with_status(409)
        .with_body(r#"{"error_summary":"reset/"}"#)
        .create_async()
        .await;

    let client = client_for(&server);

    assert_eq!(
        client.latest_cursor("/docs").await,
        Err(ObserveError::Unauthorized(401))
    );
    assert!(matches!(
        client.longpoll("garbled").await,
        Err(ObserveError::MalformedResponse(_))
    ));
    assert!(matches!(
        client.longpoll("expired").await,
        Err(ObserveError::Transport(_))
    ));
}

#[tokio::test]
async fn provider_without_token_declines() {
    init_tracing();

    let provider = DropboxProvider::new(None, CursorPollSettings::default());
    let (callback, _) = counting_callback();
    let notifier = ChangeNotifier::new("/docs", Delivery::spawn(), callback);

    assert!(provider
        .create_observation_task("/docs", ObservationScope::Children, notifier)
        .is_none());
}

#[tokio::test]
async fn reported_change_notifies_and_caches_fresh_cursor() {
    init_tracing();

    let mut server = Server::new_async().await;
    let cursor_calls = Arc::new(AtomicUsize::new(0));
    let cursor_mock = server
        .mock("POST", CURSOR_PATH)
        .match_body(Matcher::Json(json!({ "path": "/docs" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request({
            let cursor_calls = Arc::clone(&cursor_calls);
            move |_| {
                let n = cursor_calls.fetch_add(1, Ordering::SeqCst);
                format!(r#"{{"cursor":"C{n}"}}"#).into_bytes()
            }
        })
        .expect(2)
        .create_async()
        .await;

    let polls = Arc::new(AtomicUsize::new(0));
    server
        .mock("POST", LONGPOLL_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request({
            let polls = Arc::clone(&polls);
            move |_| {
                if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                    br#"{"changes":true}"#.to_vec()
                } else {
                    // Park the task in a long server-requested backoff.
                    br#"{"changes":false,"backoff":600}"#.to_vec()
                }
            }
        })
        .create_async()
        .await;

    let provider = DropboxProvider::new(Some(client_for(&server)), CursorPollSettings::default());
    let registry = ObservationRegistry::new();
    let (callback, count) = counting_callback();

    registry.register("docs", ObservationScope::Descendants, &provider, callback);

    with_timeout(async {
        while polls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    registry.flush().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(provider.cursor_cache().get("/docs").as_deref(), Some("C1"));

    with_timeout(registry.shutdown()).await;
    cursor_mock.assert_async().await;
}
