#![cfg(test)]

use super::web::*;
use crate::config::Config;
use crate::error::{ChargeError, Result};
use crate::report::ReportAssembler;
use crate::source::SampleSource;
use crate::status::{LiveSnapshot, LiveStatus, StationStatus};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use chrono_tz::Tz;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

struct StaticSamples(Value);

#[async_trait::async_trait]
impl SampleSource for StaticSamples {
    async fn fetch_samples(&self) -> Result<Value> {
        Ok(self.0.clone())
    }
}

struct DownSamples;

#[async_trait::async_trait]
impl SampleSource for DownSamples {
    async fn fetch_samples(&self) -> Result<Value> {
        Err(ChargeError::network("connection refused"))
    }
}

fn power_logs() -> Value {
    json!([
        {"charge_transaction_id": 1, "created": "2024-03-04T19:00:00Z", "energy_kwh": 15.0,
         "power_kw": 7.5, "delta_power_cost": 1.25, "kwh_rate": 0.25, "resident_name": "A"},
        {"charge_transaction_id": 1, "created": "2024-03-04T18:00:00Z", "energy_kwh": 10.0,
         "power_kw": 0.0, "delta_power_cost": 0.0, "kwh_rate": 0.25, "resident_name": "A"},
        {"charge_transaction_id": 2, "created": "2024-01-09T07:00:00Z", "energy_kwh": 100.0,
         "power_kw": 3.0, "resident_name": "B"},
        {"charge_transaction_id": 2, "created": "2024-01-09T09:00:00Z", "energy_kwh": 106.0,
         "power_kw": 3.0, "delta_power_cost": 1.5, "resident_name": "B"},
        {"charge_transaction_id": 3, "created": "garbage", "energy_kwh": 1.0, "power_kw": 1.0}
    ])
}

fn charging_status() -> LiveStatus {
    let snapshot: LiveSnapshot = serde_json::from_value(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "transactionId": 1,
        "data": {"Power.Active.Import": 7.5}
    }))
    .unwrap();
    LiveStatus {
        state: StationStatus::Charging,
        is_self: None,
        last_update: Some(chrono::Utc::now()),
        snapshot_time: Some(chrono::Utc::now()),
        snapshot: Some(snapshot),
    }
}

fn state_with(samples: Arc<dyn SampleSource>) -> (AppState, watch::Sender<LiveStatus>) {
    let (status_tx, status_rx) = watch::channel(charging_status());
    let state = AppState {
        config: Arc::new(Config::default()),
        samples,
        assembler: Arc::new(ReportAssembler::new(Tz::UTC, "€", 12)),
        status_rx,
    };
    (state, status_tx)
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_ok() {
    let router = axum::Router::new().route("/api/health", get(health));
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn report_contains_summary_and_buckets() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(power_logs())));
    let (status, body) = get_json(state, "/api/report?year=2024").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["totalSessions"], 2);
    assert_eq!(body["skippedSamples"], 1);
    assert_eq!(body["timezone"], "UTC");
    assert_eq!(body["hourly"]["points"].as_array().unwrap().len(), 24);
    assert_eq!(body["monthly"][0]["label"], "March '24");
    assert_eq!(body["monthly"][1]["label"], "January '24");
}

#[tokio::test]
async fn owner_scoped_sessions() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(power_logs())));
    let (status, body) = get_json(state, "/api/sessions?owner=A").await;

    assert_eq!(status, StatusCode::OK);
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["sessionId"], "1");
    assert_eq!(sessions[0]["energyConsumedKwh"], 5.0);
    assert_eq!(sessions[0]["peakPowerKw"], 7.5);
}

#[tokio::test]
async fn session_detail_lists_samples_in_time_order() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(power_logs())));
    let (status, body) = get_json(state.clone(), "/api/sessions/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["measurement"]["energyConsumedKwh"], 5.0);
    assert_eq!(body["measurement"]["totalCost"], 1.25);
    let samples = body["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0]["cumulativeEnergyKwh"], 10.0);
    assert_eq!(samples[1]["powerKw"], 7.5);
    assert_eq!(samples[1]["incrementalCost"], 1.25);
    assert_eq!(samples[1]["rate"], 0.25);

    let (status, _) = get_json(state.clone(), "/api/sessions/1?owner=B").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = get_json(state, "/api/sessions/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("42"));
}

#[tokio::test]
async fn hourly_cost_metric_from_query() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(power_logs())));
    let (status, body) = get_json(state, "/api/report/hourly?year=2024&metric=cost").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metric"], "cost");
    assert_eq!(body["points"][18]["value"], 1.25);
    assert_eq!(body["points"][7]["value"], 1.5);
}

#[tokio::test]
async fn unreachable_sample_store_is_bad_gateway() {
    let (state, _tx) = state_with(Arc::new(DownSamples));
    let (status, body) = get_json(state, "/api/report/monthly").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn status_marks_own_session() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(power_logs())));
    let (_, admin) = get_json(state.clone(), "/api/status").await;
    assert_eq!(admin["state"], "charging");
    assert!(admin.get("isSelf").is_none());

    let (_, mine) = get_json(state.clone(), "/api/status?owner=A").await;
    assert_eq!(mine["isSelf"], true);

    let (_, theirs) = get_json(state, "/api/status?owner=B").await;
    assert_eq!(theirs["isSelf"], false);
}

#[tokio::test]
async fn status_follows_latest_poll() {
    let (state, tx) = state_with(Arc::new(StaticSamples(json!([]))));
    tx.send_replace(LiveStatus::default());
    let (_, body) = get_json(state, "/api/status").await;
    assert_eq!(body["state"], "unknown");
}

#[tokio::test]
async fn config_schema_is_json_schema() {
    let (state, _tx) = state_with(Arc::new(StaticSamples(json!([]))));
    let (status, body) = get_json(state, "/api/config/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["properties"]["report"].is_object());
}
