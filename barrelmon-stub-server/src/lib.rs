use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use barrelmon_common::{Barrel, ErrorResponse, Measurement, NewBarrel, NewMeasurement};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use uuid::Uuid;

pub mod config;
use config::{LOCK_TIMEOUT, MAX_BODY_SIZE};

/// In-memory resources. The `*_order` vectors keep list responses in creation order.
#[derive(Default)]
pub struct StoreState {
    pub barrels: HashMap<String, Barrel>,
    pub measurements: HashMap<String, Measurement>,
    barrel_order: Vec<String>,
    measurement_order: Vec<String>,
}

impl StoreState {
    pub fn insert_barrel(&mut self, barrel: Barrel) {
        self.barrel_order.push(barrel.id.clone());
        self.barrels.insert(barrel.id.clone(), barrel);
    }

    pub fn insert_measurement(&mut self, measurement: Measurement) {
        self.measurement_order.push(measurement.id.clone());
        self.measurements.insert(measurement.id.clone(), measurement);
    }

    /// Remove a barrel. Its measurements are left in place.
    pub fn remove_barrel(&mut self, id: &str) -> Option<Barrel> {
        let removed = self.barrels.remove(id)?;
        self.barrel_order.retain(|b| b != id);
        Some(removed)
    }

    pub fn list_barrels(&self) -> Vec<Barrel> {
        self.barrel_order.iter().filter_map(|id| self.barrels.get(id).cloned()).collect()
    }

    pub fn list_measurements(&self) -> Vec<Measurement> {
        self.measurement_order.iter().filter_map(|id| self.measurements.get(id).cloned()).collect()
    }
}

pub type Store = Arc<RwLock<StoreState>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Artificial delay added before every response.
    pub latency: Duration,
}

impl AppState {
    pub fn new(latency: Duration) -> Self {
        Self { store: Arc::new(RwLock::new(StoreState::default())), latency }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub latency: Duration,
}

impl ServerConfig {
    /// Ephemeral localhost port, no added latency.
    pub fn local() -> Self {
        Self { address: SocketAddr::from(([127, 0, 0, 1], 0)), latency: Duration::ZERO }
    }
}

/// In-memory stand-in for the Barrel Monitor API
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/barrels", get(handle_list_barrels).post(handle_create_barrel))
            .route("/barrels/:id", get(handle_get_barrel).delete(handle_delete_barrel))
            .route("/measurements", get(handle_list_measurements).post(handle_create_measurement))
            .route("/measurements/:id", get(handle_get_measurement))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = Self::create_router(AppState::new(self.config.latency));
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, latency_ms = self.config.latency.as_millis() as u64, "stub server listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Start a server on an ephemeral port in a background task and return its base URL.
pub async fn spawn_local(latency: Duration) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let server = Server::new(ServerConfig { latency, ..ServerConfig::local() });
    tokio::spawn(async move {
        if let Err(e) = server.run(ready_tx).await {
            tracing::error!(error = %e, "stub server stopped");
        }
    });
    let addr = ready_rx.await?;
    Ok(format!("http://{addr}"))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn lock_timeout() -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Server error: Lock acquisition timed out")
}

async fn pause(state: &AppState) {
    if !state.latency.is_zero() {
        tokio::time::sleep(state.latency).await;
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    if body.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Request body is required"));
    }
    serde_json::from_slice(body)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}")))
}

fn parse_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("Invalid id: {id}")))
}

/// Handler for POST /barrels: 201 with the stored barrel; 400 when a tag is missing or blank.
pub async fn handle_create_barrel(State(state): State<AppState>, body: Bytes) -> Response {
    pause(&state).await;
    let new: NewBarrel = match parse_body(&body) {
        Ok(new) => new,
        Err(response) => return response,
    };
    for (field, value) in [("qr", &new.qr), ("rfid", &new.rfid), ("nfc", &new.nfc)] {
        if value.trim().is_empty() {
            return error_response(StatusCode::BAD_REQUEST, format!("Field '{field}' must not be empty"));
        }
    }

    let barrel = Barrel { id: Uuid::new_v4().to_string(), qr: new.qr, rfid: new.rfid, nfc: new.nfc };
    let Ok(mut store) = timeout(LOCK_TIMEOUT, state.store.write()).await else {
        return lock_timeout();
    };
    store.insert_barrel(barrel.clone());
    (StatusCode::CREATED, Json(barrel)).into_response()
}

/// Handler for GET /barrels
pub async fn handle_list_barrels(State(state): State<AppState>) -> Response {
    pause(&state).await;
    let Ok(store) = timeout(LOCK_TIMEOUT, state.store.read()).await else {
        return lock_timeout();
    };
    (StatusCode::OK, Json(store.list_barrels())).into_response()
}

/// Handler for GET /barrels/:id: 400 for a malformed id, 404 when unknown.
pub async fn handle_get_barrel(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    pause(&state).await;
    if let Err(response) = parse_id(&id) {
        return response;
    }
    let Ok(store) = timeout(LOCK_TIMEOUT, state.store.read()).await else {
        return lock_timeout();
    };
    match store.barrels.get(&id) {
        Some(barrel) => (StatusCode::OK, Json(barrel.clone())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Barrel not found: {id}")),
    }
}

/// Handler for DELETE /barrels/:id: 200 with an empty body.
pub async fn handle_delete_barrel(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    pause(&state).await;
    if let Err(response) = parse_id(&id) {
        return response;
    }
    let Ok(mut store) = timeout(LOCK_TIMEOUT, state.store.write()).await else {
        return lock_timeout();
    };
    match store.remove_barrel(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Barrel not found: {id}")),
    }
}

/// Handler for POST /measurements: 400 for a bad body or id, 404 when the barrel is unknown.
pub async fn handle_create_measurement(State(state): State<AppState>, body: Bytes) -> Response {
    pause(&state).await;
    let new: NewMeasurement = match parse_body(&body) {
        Ok(new) => new,
        Err(response) => return response,
    };
    if let Err(response) = parse_id(&new.barrel_id) {
        return response;
    }
    if new.dirt_level < 0.0 || new.weight < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "dirtLevel and weight must not be negative");
    }

    let Ok(mut store) = timeout(LOCK_TIMEOUT, state.store.write()).await else {
        return lock_timeout();
    };
    if !store.barrels.contains_key(&new.barrel_id) {
        return error_response(StatusCode::NOT_FOUND, format!("Barrel not found: {}", new.barrel_id));
    }
    let measurement = Measurement {
        id: Uuid::new_v4().to_string(),
        barrel_id: new.barrel_id,
        dirt_level: new.dirt_level,
        weight: new.weight,
    };
    store.insert_measurement(measurement.clone());
    (StatusCode::CREATED, Json(measurement)).into_response()
}

/// Handler for GET /measurements
pub async fn handle_list_measurements(State(state): State<AppState>) -> Response {
    pause(&state).await;
    let Ok(store) = timeout(LOCK_TIMEOUT, state.store.read()).await else {
        return lock_timeout();
    };
    (StatusCode::OK, Json(store.list_measurements())).into_response()
}

/// Handler for GET /measurements/:id
pub async fn handle_get_measurement(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    pause(&state).await;
    if let Err(response) = parse_id(&id) {
        return response;
    }
    let Ok(store) = timeout(LOCK_TIMEOUT, state.store.read()).await else {
        return lock_timeout();
    };
    match store.measurements.get(&id) {
        Some(measurement) => (StatusCode::OK, Json(measurement.clone())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Measurement not found: {id}")),
    }
}
