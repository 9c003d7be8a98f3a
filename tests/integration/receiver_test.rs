// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use geonotify::domain::services::webhook_service::{WebhookError, WebhookRequest, WebhookService};
use geonotify::infrastructure::services::webhook_service_impl::HttpWebhookService;
use geonotify::presentation::routes::receiver_routes;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_receiver(path: &str) -> String {
    let app = receiver_routes(path);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_receiver_accepts_json_object() {
    let base = start_receiver("/webhook").await;

    let response = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .header("Idempotency-Key", "31")
        .header("X-Event-Type", "location_check")
        .json(&serde_json::json!({ "check_id": 31, "incident_ids": [1] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_receiver_rejects_invalid_json() {
    let base = start_receiver("/webhook").await;
    let client = reqwest::Client::new();

    for body in ["not json", "[1, 2, 3]"] {
        let response = client
            .post(format!("{}/webhook", base))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_receiver_serves_health() {
    let base = start_receiver("/hooks/geo").await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = reqwest::Client::new()
        .post(format!("{}/webhook", base))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_client_against_receiver() {
    let base = start_receiver("/webhook").await;
    let client = HttpWebhookService::new(
        format!("{}/webhook", base),
        Duration::from_secs(2),
        Some("local-secret".to_string()),
    )
    .unwrap();

    let ok = WebhookRequest {
        event_type: "location_check".to_string(),
        idempotency_key: "77".to_string(),
        body: r#"{"check_id":77}"#.to_string(),
    };
    assert_eq!(client.send_webhook(&ok).await.unwrap(), 200);

    let broken = WebhookRequest {
        body: "{".to_string(),
        ..ok
    };
    let err = client.send_webhook(&broken).await.unwrap_err();
    assert!(matches!(err, WebhookError::Status(400)));
}
