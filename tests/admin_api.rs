//! Admin API over a real socket.

mod common;

use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

use balance_engine::admin::{self, AdminState};
use balance_engine::Shutdown;
use common::*;

const KEY: &str = "test-key";

struct Harness {
    base: String,
    client: reqwest::Client,
    shutdown: Shutdown,
}

impl Harness {
    async fn start() -> Self {
        let provider = ScriptedProvider::ok(1.25).shared();
        let (engine, _) = engine_with(vec![endpoint("http://primary", 0, provider)], false, fast_config());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let shutdown = Shutdown::new();
        let state = AdminState { engine, api_key: KEY.into() };
        tokio::spawn(admin::serve(listener, state, shutdown.clone()));

        Self { base, client: reqwest::Client::new(), shutdown }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base, path)).bearer_auth(KEY)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base, path)).bearer_auth(KEY)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[tokio::test]
async fn test_requests_without_key_are_rejected() {
    let h = Harness::start().await;

    let resp = h.client.get(format!("{}/admin/status", h.base)).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = h
        .client
        .get(format!("{}/admin/status", h.base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_status_and_query() {
    let h = Harness::start().await;

    let status: Value = h.get("/admin/status").send().await.unwrap().json().await.unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["networks"], json!(["ethereum"]));
    assert_eq!(status["queue_depth"], 0);

    let result: Value = h
        .get("/admin/query/ethereum/0xabc")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["address"], "0xabc");
    assert_eq!(result["display_balance"], 1.25);
    assert_eq!(result["unit_symbol"], "ETH");
    assert_eq!(result["usd_value"], 2500.0);
    assert!(result["error_kind"].is_null());

    let cache: Value = h.get("/admin/cache").send().await.unwrap().json().await.unwrap();
    assert_eq!(cache["total"], 1);

    let cleared: Value = h.post("/admin/cache/clear").send().await.unwrap().json().await.unwrap();
    assert_eq!(cleared["cleared"], 1);
}

#[tokio::test]
async fn test_query_many_reports_unknown_network() {
    let h = Harness::start().await;

    let results: Value = h
        .post("/admin/query")
        .json(&json!([
            { "network": "ethereum", "address": "0x1" },
            { "network": "dogecoin", "address": "D1" },
        ]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results[0]["display_balance"], 1.25);
    assert_eq!(results[1]["error_kind"], "unknown");
}

#[tokio::test]
async fn test_watch_lifecycle() {
    let h = Harness::start().await;

    let resp = h
        .post("/admin/watch")
        .json(&json!({
            "network": "ethereum",
            "address": "0xwatch",
            "display_name": "Cold wallet",
            "check_interval_minutes": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let entity: Value = resp.json().await.unwrap();
    let id = entity["id"].as_str().unwrap().to_string();
    assert_eq!(entity["check_interval_minutes"], 10);

    let watched: Value = h.get("/admin/watch").send().await.unwrap().json().await.unwrap();
    assert_eq!(watched.as_array().unwrap().len(), 1);

    // The first check runs in the background
    let mut history = Value::Null;
    for _ in 0..50 {
        history = h
            .get(&format!("/admin/watch/{}/history", id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !history.as_array().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(history.as_array().unwrap().len(), 1);

    let resp = h.get(&format!("/admin/watch/{}/history.csv", id)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let csv = resp.text().await.unwrap();
    assert!(csv.starts_with("# Balance history: Cold wallet"));

    let resp = h
        .client
        .delete(format!("{}/admin/watch/{}", h.base, id))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = h.get(&format!("/admin/watch/{}/history", id)).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_bad_watch_and_unknown_alert() {
    let h = Harness::start().await;

    let resp = h
        .post("/admin/watch")
        .json(&json!({ "network": "dogecoin", "address": "D1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("dogecoin"));

    let resp = h
        .post(&format!("/admin/alerts/{}/ack", uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let alerts: Value = h.get("/admin/alerts?unread=true").send().await.unwrap().json().await.unwrap();
    assert_eq!(alerts, json!([]));
}

#[tokio::test]
async fn test_portfolio_summary() {
    let h = Harness::start().await;

    let summary: Value = h
        .post("/admin/portfolio")
        .json(&json!([
            { "id": "w1", "network": "ethereum", "address": "0x1" },
            { "id": "w2", "network": "ethereum", "address": "0x2" },
        ]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["wallet_count"], 2);
    assert_eq!(summary["total_value"], 5000.0);
    assert_eq!(summary["networks"][0]["network"], "ethereum");
}
