//! End-to-end inspector tests: file storage and a local HTTP endpoint.

use std::path::Path;

use serde_json::{json, Value};
use sr_config::{Environment, InspectorConfig, InspectorOptions};
use sr_core::{ExitCode, Inspector, QueueReport};
use sr_telemetry::{SchemaEntry, TypeTag};
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(server: &MockServer, dir: &Path, env: Environment) -> InspectorOptions {
    let mut options = InspectorOptions::new("test-key", "3.1.0")
        .with_env(env)
        .with_app_name("checkout-web")
        .with_storage_dir(dir);
    options.endpoint = Some(format!("{}/inspector/v1/track", server.uri()));
    options.delivery_timeout_seconds = Some(2);
    options
}

async fn server_with_status(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

async fn delivered_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .flat_map(|req| {
            let body: Value = serde_json::from_slice(&req.body).expect("json body");
            body.as_array().cloned().unwrap_or_default()
        })
        .collect()
}

#[tokio::test]
async fn test_size_threshold_delivers_session_and_event() {
    let server = server_with_status(200).await;
    let temp = TempDir::new().expect("temp dir");
    let mut opts = options(&server, temp.path(), Environment::Prod);
    opts.batch_size = Some(2);
    let inspector = Inspector::from_options(opts).await.expect("inspector");

    let schema = inspector.track_schema_from_event(
        "Order Placed",
        &json!({"total": 42.5, "items": [{"sku": "A1"}], "coupon": null}),
    );
    assert_eq!(schema[0], SchemaEntry::scalar("total", TypeTag::Float));
    assert_eq!(schema[1].property_type, TypeTag::List);

    inspector.batcher().wait_idle().await;
    assert_eq!(inspector.batcher().queue_len(), 0);

    let bodies = delivered_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["type"], "sessionStarted");
    assert_eq!(
        bodies[0]["sessionId"],
        inspector.session_id().expect("session").as_str()
    );
    assert_eq!(bodies[1]["type"], "event");
    assert_eq!(bodies[1]["eventName"], "Order Placed");
    assert_eq!(bodies[1]["appName"], "checkout-web");
    assert_eq!(bodies[1]["env"], "prod");
}

#[tokio::test]
async fn test_failed_delivery_survives_restart() {
    let temp = TempDir::new().expect("temp dir");

    let failing = server_with_status(503).await;
    let inspector = Inspector::from_options(options(&failing, temp.path(), Environment::Prod))
        .await
        .expect("inspector");
    inspector.track_schema_from_event("Signup", &json!({"plan": "pro"}));
    inspector.track_schema("Login", vec![SchemaEntry::scalar("method", TypeTag::String)]);

    let err = inspector.shutdown().await.unwrap_err();
    assert_eq!(err.code(), 41);
    assert_eq!(ExitCode::from(&err), ExitCode::DeliveryError);

    let healthy = server_with_status(200).await;
    let reopened = Inspector::from_options(options(&healthy, temp.path(), Environment::Prod))
        .await
        .expect("reopened inspector");
    assert_eq!(reopened.batcher().queue_len(), 3);

    assert_eq!(reopened.flush().await.expect("flush"), 3);
    assert_eq!(reopened.batcher().queue_len(), 0);

    let names: Vec<_> = delivered_bodies(&healthy)
        .await
        .into_iter()
        .filter_map(|b| b["eventName"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["Signup", "Login"]);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let temp = TempDir::new().expect("temp dir");
    let server = server_with_status(200).await;

    let first = Inspector::from_options(options(&server, temp.path(), Environment::Prod))
        .await
        .expect("inspector");
    first.track_schema("Open", vec![]);
    let session = first.session_id().expect("session started");
    first.shutdown().await.expect("shutdown");

    let second = Inspector::from_options(options(&server, temp.path(), Environment::Prod))
        .await
        .expect("inspector");
    second.track_schema("Close", vec![]);
    assert_eq!(second.session_id(), Some(session));
    // only the event was queued, no second session start
    assert_eq!(second.batcher().queue_len(), 1);
}

#[tokio::test]
async fn test_invalid_payload_is_logged_not_raised() {
    let temp = TempDir::new().expect("temp dir");
    let server = server_with_status(200).await;
    let inspector = Inspector::from_options(options(&server, temp.path(), Environment::Prod))
        .await
        .expect("inspector");

    assert!(inspector.track_schema_from_event("Weird", &json!("not an object")).is_empty());
    assert!(inspector.extract_schema(&json!(17)).is_empty());
    assert_eq!(
        inspector.extract_schema(&json!({"ok": true})),
        vec![SchemaEntry::scalar("ok", TypeTag::Boolean)]
    );
}

#[tokio::test]
async fn test_blank_api_key_is_rejected() {
    let temp = TempDir::new().expect("temp dir");
    let server = server_with_status(200).await;
    let mut opts = options(&server, temp.path(), Environment::Prod);
    opts.api_key = Some("   ".to_string());

    let err = Inspector::from_options(opts).await.unwrap_err();
    assert_eq!(err.code(), 11);
    assert_eq!(ExitCode::from(&err), ExitCode::ConfigError);
}

#[tokio::test]
async fn test_dev_mode_defaults() {
    let temp = TempDir::new().expect("temp dir");
    let server = server_with_status(200).await;
    let mut opts = options(&server, temp.path(), Environment::Dev);
    opts.batch_flush_seconds = Some(60);
    let inspector = Inspector::from_options(opts).await.expect("inspector");

    assert!(inspector.should_log());
    assert_eq!(inspector.batcher().config().flush_interval_secs, 60);

    let config = InspectorConfig::resolve(options(&server, temp.path(), Environment::Dev)).unwrap();
    assert_eq!(config.batch.flush_interval_secs, 1);
    assert!(config.log_enabled);

    inspector.enable_logging(false);
    assert!(!inspector.should_log());
}

#[tokio::test]
async fn test_runtime_batch_tuning() {
    let temp = TempDir::new().expect("temp dir");
    let server = server_with_status(200).await;
    let inspector = Inspector::from_options(options(&server, temp.path(), Environment::Prod))
        .await
        .expect("inspector");

    inspector.set_batch_size(1);
    inspector.set_batch_flush_seconds(120);
    assert_eq!(inspector.batcher().config().batch_size_threshold, 1);
    assert_eq!(inspector.batcher().config().flush_interval_secs, 120);

    inspector.track_schema("Tap", vec![]);
    inspector.batcher().wait_idle().await;
    inspector.flush().await.expect("flush");

    assert_eq!(inspector.batcher().queue_len(), 0);
    assert_eq!(delivered_bodies(&server).await.len(), 2);
}

#[tokio::test]
async fn test_queue_report_reads_undelivered_state() {
    let temp = TempDir::new().expect("temp dir");
    let failing = server_with_status(503).await;
    let inspector = Inspector::from_options(options(&failing, temp.path(), Environment::Prod))
        .await
        .expect("inspector");
    inspector.track_schema("Search", vec![SchemaEntry::scalar("query", TypeTag::String)]);
    inspector.track_schema("Search", vec![]);
    let session = inspector.session_id().expect("session");
    assert!(inspector.shutdown().await.is_err());

    let report = QueueReport::load(temp.path()).await;
    assert_eq!(report.queued, 3);
    assert_eq!(report.session_started, 1);
    assert_eq!(report.event_schema, 2);
    assert_eq!(report.session_id, Some(session));
    assert!(report.oldest_created_at.is_some());

    let empty = TempDir::new().expect("temp dir");
    let report = QueueReport::load(empty.path()).await;
    assert_eq!(report.queued, 0);
    assert_eq!(report.oldest_created_at, None);
    assert_eq!(report.session_id, None);
}
