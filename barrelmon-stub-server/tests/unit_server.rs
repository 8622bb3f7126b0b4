use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use barrelmon_common::{Barrel, ErrorResponse, Measurement};
use barrelmon_stub_server::{
    handle_create_barrel, handle_create_measurement, handle_delete_barrel, handle_get_barrel,
    handle_get_measurement, handle_list_barrels, handle_list_measurements, spawn_local, AppState,
};
use serde_json::json;
use std::time::{Duration, Instant};

// --- Test helpers ---

const UNKNOWN_ID: &str = "00000000-0000-4000-8000-000000000000";

fn empty_store() -> AppState {
    AppState::new(Duration::ZERO)
}

/// Consume a response body into bytes.
async fn response_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn response_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&response_body(response).await).unwrap()
}

fn body(value: serde_json::Value) -> Bytes {
    Bytes::from(serde_json::to_vec(&value).unwrap())
}

async fn create_barrel(state: &AppState, qr: &str) -> Barrel {
    let response = handle_create_barrel(
        State(state.clone()),
        body(json!({"qr": qr, "rfid": "RFID-1", "nfc": "NFC-1"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

async fn create_measurement(state: &AppState, barrel_id: &str) -> Response {
    handle_create_measurement(
        State(state.clone()),
        body(json!({"barrelId": barrel_id, "dirtLevel": 42.5, "weight": 120.0})),
    )
    .await
}

// --- Barrels ---

#[tokio::test]
async fn test_create_barrel_returns_created_resource() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;

    assert_eq!(barrel.qr, "QR-1");
    assert!(uuid::Uuid::parse_str(&barrel.id).is_ok());
    assert!(state.store.read().await.barrels.contains_key(&barrel.id));
}

#[tokio::test]
async fn test_create_barrel_missing_field_is_bad_request() {
    let response =
        handle_create_barrel(State(empty_store()), body(json!({"qr": "QR-1", "rfid": "RFID-1"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_barrel_blank_field_is_bad_request() {
    let response =
        handle_create_barrel(State(empty_store()), body(json!({"qr": "", "rfid": "R", "nfc": "N"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = response_json(response).await;
    assert!(error.error.contains("qr"));
}

#[tokio::test]
async fn test_create_barrel_empty_body_is_bad_request() {
    let response = handle_create_barrel(State(empty_store()), Bytes::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = handle_create_barrel(State(empty_store()), body(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_barrels_in_creation_order() {
    let state = empty_store();
    let first = create_barrel(&state, "QR-1").await;
    let second = create_barrel(&state, "QR-2").await;

    let response = handle_list_barrels(State(state)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let barrels: Vec<Barrel> = response_json(response).await;
    assert_eq!(barrels, vec![first, second]);
}

#[tokio::test]
async fn test_get_barrel_found() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;

    let response = handle_get_barrel(State(state), Path(barrel.id.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Barrel = response_json(response).await;
    assert_eq!(fetched, barrel);
}

#[tokio::test]
async fn test_get_barrel_unknown_is_not_found() {
    let response = handle_get_barrel(State(empty_store()), Path(UNKNOWN_ID.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_barrel_malformed_id_is_bad_request() {
    let response = handle_get_barrel(State(empty_store()), Path("not-a-uuid".to_string())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_barrel_then_get_is_not_found() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;

    let response = handle_delete_barrel(State(state.clone()), Path(barrel.id.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response_body(response).await.is_empty());

    let response = handle_get_barrel(State(state.clone()), Path(barrel.id.clone())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let barrels: Vec<Barrel> = response_json(handle_list_barrels(State(state)).await).await;
    assert!(barrels.is_empty());
}

#[tokio::test]
async fn test_delete_unknown_barrel_is_not_found() {
    let response = handle_delete_barrel(State(empty_store()), Path(UNKNOWN_ID.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Measurements ---

#[tokio::test]
async fn test_create_measurement_for_existing_barrel() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;

    let response = create_measurement(&state, &barrel.id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let measurement: Measurement = response_json(response).await;
    assert_eq!(measurement.barrel_id, barrel.id);
    assert_eq!(measurement.dirt_level, 42.5);

    let response = handle_get_measurement(State(state), Path(measurement.id.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_measurement_unknown_barrel_is_not_found() {
    let response = create_measurement(&empty_store(), UNKNOWN_ID).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_measurement_missing_barrel_id_is_bad_request() {
    let response =
        handle_create_measurement(State(empty_store()), body(json!({"dirtLevel": 1.0, "weight": 2.0}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_measurement_wrong_types_is_bad_request() {
    let response = handle_create_measurement(
        State(empty_store()),
        body(json!({"barrelId": UNKNOWN_ID, "dirtLevel": "dirty", "weight": "heavy"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_measurement_negative_weight_is_bad_request() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;
    let response = handle_create_measurement(
        State(state),
        body(json!({"barrelId": barrel.id, "dirtLevel": 1.0, "weight": -5.0})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_barrel_leaves_measurements_orphaned() {
    let state = empty_store();
    let barrel = create_barrel(&state, "QR-1").await;
    let measurement: Measurement = response_json(create_measurement(&state, &barrel.id).await).await;

    handle_delete_barrel(State(state.clone()), Path(barrel.id.clone())).await;

    let response = handle_get_measurement(State(state.clone()), Path(measurement.id.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Measurement> = response_json(handle_list_measurements(State(state)).await).await;
    assert_eq!(listed, vec![measurement]);
}

#[tokio::test]
async fn test_get_measurement_unknown_is_not_found() {
    let response = handle_get_measurement(State(empty_store()), Path(UNKNOWN_ID.to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Server behaviour ---

#[tokio::test]
async fn test_latency_delays_response() {
    let state = AppState::new(Duration::from_millis(50));
    let started = Instant::now();
    let response = handle_list_barrels(State(state)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_write_lock_timeout_returns_service_unavailable() {
    let state = empty_store();
    let _guard = state.store.write().await;

    let response = handle_list_barrels(State(state.clone())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_spawn_local_binds_ephemeral_port() {
    let base_url = spawn_local(Duration::ZERO).await.unwrap();
    assert!(base_url.starts_with("http://127.0.0.1:"));
    assert!(!base_url.ends_with(":0"));
}
