//! Failure injection tests for the gateway.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn unsupported_verb_is_405() {
    let backend = common::start_echo_backend("b1").await;
    let gateway = common::spawn_gateway(common::static_config(&[("order-service", backend)])).await;

    let res = common::client()
        .request(reqwest::Method::OPTIONS, gateway.url("/order-service/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": 405, "detail": "Method not allowed"}));

    gateway.stop().await;
}

#[tokio::test]
async fn unknown_service_is_503() {
    let gateway = common::spawn_gateway(common::static_config(&[])).await;

    let res = common::client()
        .get(gateway.url("/unknown-service/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 503);
    assert_eq!(body["detail"], "Service unknown-service is not available");

    gateway.stop().await;
}

#[tokio::test]
async fn dead_upstream_is_502() {
    let dead = common::dead_addr().await;
    let gateway = common::spawn_gateway(common::static_config(&[("order-service", dead)])).await;

    let res = common::client()
        .post(gateway.url("/order-service/orders"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": 502, "detail": "Bad gateway"}));

    gateway.stop().await;
}

#[tokio::test]
async fn retries_give_up_with_502() {
    let dead = common::dead_addr().await;
    let mut config = common::static_config(&[("order-service", dead)]);
    config.retries.enabled = true;
    config.retries.max_retries = 2;
    config.retries.delay_ms = 10;
    let gateway = common::spawn_gateway(config).await;

    let res = common::client()
        .get(gateway.url("/order-service/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    gateway.stop().await;
}

#[tokio::test]
async fn unhealthy_instances_are_503_until_recovery() {
    let status = Arc::new(AtomicU16::new(500));
    let backend = common::start_switchable_backend(status.clone()).await;

    let mut config = common::static_config(&[("flaky-service", backend)]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    let gateway = common::spawn_gateway(config).await;
    let client = common::client();

    let summary = wait_for_health(&client, &gateway, "flaky-service", false).await;
    let failed_at = summary["instances"][0]["last_health_check"].as_f64().unwrap();
    assert!(failed_at > 0.0);

    let res = client.get(gateway.url("/flaky-service/data")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Service flaky-service is not healthy");

    status.store(200, Ordering::SeqCst);
    let summary = wait_for_health(&client, &gateway, "flaky-service", true).await;
    let recovered_at = summary["instances"][0]["last_health_check"].as_f64().unwrap();
    assert!(recovered_at >= failed_at);

    let res = client.get(gateway.url("/flaky-service/data")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "payload");

    gateway.stop().await;
}

async fn wait_for_health(
    client: &reqwest::Client,
    gateway: &common::TestGateway,
    service: &str,
    healthy: bool,
) -> Value {
    for _ in 0..50 {
        let summary: Value = client
            .get(gateway.url(&format!("/services/{}/health", service)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if summary["instances"][0]["healthy"] == healthy {
            return summary;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("{} never became healthy={}", service, healthy);
}
