//! HTTP delivery against a local server.

use chrono::Utc;
use serde_json::{json, Value};
use sr_common::SessionId;
use sr_config::{Environment, InspectorConfig, InspectorOptions};
use sr_telemetry::{
    DeliveryClient, DeliveryError, HttpDeliveryClient, QueuedEvent, SchemaEntry, TypeTag,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> InspectorConfig {
    let mut options = InspectorOptions::new("test-key", "2.4.0")
        .with_env(Environment::Staging)
        .with_app_name("shop");
    options.endpoint = Some(format!("{}/inspector/v1/track", server.uri()));
    options.delivery_timeout_seconds = Some(2);
    InspectorConfig::resolve(options).expect("valid config")
}

fn batch() -> Vec<QueuedEvent> {
    vec![
        QueuedEvent::session_started(SessionId::generate(Utc::now()), Utc::now()),
        QueuedEvent::event_schema(
            "Checkout",
            vec![SchemaEntry::scalar("total", TypeTag::Float)],
            Utc::now(),
        ),
    ]
}

#[tokio::test]
async fn test_posts_json_array_of_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/inspector/v1/track"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpDeliveryClient::new(&config_for(&server)).unwrap();
    let items = batch();
    client.send_batch(&items).await.expect("delivered");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let bodies = body.as_array().expect("array body");
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["type"], "sessionStarted");
    assert_eq!(bodies[1]["type"], "event");
    assert_eq!(bodies[1]["eventName"], "Checkout");
    assert_eq!(bodies[1]["eventProperties"][0]["propertyType"], "float");
    for body in bodies {
        assert_eq!(body["apiKey"], "test-key");
        assert_eq!(body["appName"], "shop");
        assert_eq!(body["appVersion"], "2.4.0");
        assert_eq!(body["env"], "staging");
        assert_eq!(body["libPlatform"], "rust");
    }
    assert_eq!(bodies[1]["messageId"], items[1].message_id().to_string());
}

#[tokio::test]
async fn test_non_success_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = HttpDeliveryClient::new(&config_for(&server)).unwrap();
    let err = client.send_batch(&batch()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 503 }));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let mut options = InspectorOptions::new("test-key", "2.4.0").with_env(Environment::Prod);
    options.endpoint = Some("http://127.0.0.1:1/inspector/v1/track".to_string());
    options.delivery_timeout_seconds = Some(2);
    let config = InspectorConfig::resolve(options).unwrap();

    let client = HttpDeliveryClient::new(&config).unwrap();
    let err = client.send_batch(&batch()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
}

#[tokio::test]
async fn test_sampling_rate_from_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"samplingRate": 0.0})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpDeliveryClient::new(&config_for(&server)).unwrap();
    client.send_batch(&batch()).await.expect("first batch delivered");
    assert_eq!(client.sampling_rate(), 0.0);

    // sampled out: reported as delivered without a request
    client.send_batch(&batch()).await.expect("sampled batch");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = HttpDeliveryClient::new(&config_for(&server)).unwrap();
    client.send_batch(&[]).await.unwrap();
}
