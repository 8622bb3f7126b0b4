use barrelmon_common::config::ApiConfig;
use barrelmon_common::{
    Barrel, ErrorResponse, HarnessError, Measurement, NewBarrel, NewMeasurement, Result,
    BARRELS_PATH, MEASUREMENTS_PATH,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Barrel Monitor API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme + authority, e.g. `http://127.0.0.1:8080`. A trailing `/` is ignored.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn from_api(api: &ApiConfig) -> Self {
        Self { base_url: api.base_url.clone(), timeout: Duration::from_secs(api.timeout_secs) }
    }
}

/// One completed HTTP exchange. Any status, including 4xx/5xx, is an `Exchange`;
/// only transport failures surface as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub status: u16,
    /// Time from sending the request until the full body was read.
    pub response_time: Duration,
    pub body: String,
    pub request_size: u64,
    pub response_size: u64,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx exchange into `HarnessError::HttpError`, using the API's
    /// `{"error": ...}` envelope when present.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = serde_json::from_str::<ErrorResponse>(&self.body)
            .map(|r| r.error)
            .unwrap_or_else(|_| format!("Server returned status: {}", self.status));
        Err(HarnessError::HttpError(self.status, message))
    }

    /// Decode the body of a successful exchange.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let exchange = self.error_for_status()?;
        serde_json::from_str(&exchange.body).map_err(|e| HarnessError::Serialization(e.to_string()))
    }
}

/// Barrel Monitor API client. Clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http_client: reqwest::Client::new() }
    }

    /// Build the absolute URL for an API path such as `/barrels/{id}`.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issue one request. Returns `Err(HarnessError::Network)` only when no response
    /// was received (connect failure, timeout, broken body).
    pub async fn issue(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Exchange> {
        let url = self.build_url(path);
        tracing::info!(%method, %url, "making request");

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .timeout(self.config.timeout)
            .header(ACCEPT, "application/json");

        let mut request_size = 0;
        if let Some(body) = body {
            let bytes =
                serde_json::to_vec(body).map_err(|e| HarnessError::Serialization(e.to_string()))?;
            tracing::debug!(body = %String::from_utf8_lossy(&bytes), "request body");
            request_size = bytes.len() as u64;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            tracing::error!(%method, %url, error = %e, "request failed");
            HarnessError::Network(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            tracing::error!(%method, %url, error = %e, "reading response body failed");
            HarnessError::Network(e.to_string())
        })?;
        let response_time = start.elapsed();

        tracing::info!(status, elapsed_ms = response_time.as_millis() as u64, "response received");
        if !body.is_empty() {
            tracing::debug!(%body, "response body");
        }

        Ok(Exchange {
            status,
            response_time,
            response_size: body.len() as u64,
            body,
            request_size,
        })
    }

    // --- Barrels ---

    pub async fn create_barrel(&self, barrel: &NewBarrel) -> Result<Exchange> {
        self.issue(Method::POST, BARRELS_PATH, Some(&to_value(barrel)?)).await
    }

    pub async fn list_barrels(&self) -> Result<Exchange> {
        self.issue(Method::GET, BARRELS_PATH, None).await
    }

    pub async fn get_barrel(&self, id: &str) -> Result<Exchange> {
        self.issue(Method::GET, &format!("{BARRELS_PATH}/{id}"), None).await
    }

    pub async fn delete_barrel(&self, id: &str) -> Result<Exchange> {
        self.issue(Method::DELETE, &format!("{BARRELS_PATH}/{id}"), None).await
    }

    // --- Measurements ---

    pub async fn create_measurement(&self, measurement: &NewMeasurement) -> Result<Exchange> {
        self.issue(Method::POST, MEASUREMENTS_PATH, Some(&to_value(measurement)?)).await
    }

    pub async fn list_measurements(&self) -> Result<Exchange> {
        self.issue(Method::GET, MEASUREMENTS_PATH, None).await
    }

    pub async fn get_measurement(&self, id: &str) -> Result<Exchange> {
        self.issue(Method::GET, &format!("{MEASUREMENTS_PATH}/{id}"), None).await
    }

    /// Create a barrel and decode the stored representation.
    pub async fn create_barrel_typed(&self, barrel: &NewBarrel) -> Result<Barrel> {
        self.create_barrel(barrel).await?.json()
    }

    /// Create a measurement and decode the stored representation.
    pub async fn create_measurement_typed(&self, measurement: &NewMeasurement) -> Result<Measurement> {
        self.create_measurement(measurement).await?.json()
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| HarnessError::Serialization(e.to_string()))
}
