use serde::{Deserialize, Serialize};

/// One observed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetric {
    /// Seconds since the Unix epoch at which the exchange started.
    pub timestamp: f64,
    pub method: String,
    pub endpoint: String,
    /// `0` means no response was received.
    pub status_code: u16,
    /// Seconds.
    pub response_time: f64,
    pub request_size: u64,
    pub response_size: u64,
    /// Set only for transport-level failures.
    pub error: Option<String>,
}

impl RequestMetric {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Key under which this observation is counted in a report's `errors` map, if any.
    ///
    /// An explicit error description wins; otherwise any status >= 400 maps to
    /// `HTTP_<status>`. Successful and 3xx exchanges have no category.
    pub fn error_category(&self) -> Option<String> {
        match &self.error {
            Some(e) => Some(e.clone()),
            None if self.status_code >= 400 => Some(format!("HTTP_{}", self.status_code)),
            None => None,
        }
    }
}

/// An observation before it is stamped with a timestamp.
///
/// ```
/// use barrelmon_metrics::Observation;
///
/// let ok = Observation::new("POST", "/barrels", 201, 0.12).with_sizes(48, 96);
/// let refused = Observation::transport_failure("GET", "/barrels", "connection refused");
/// assert_eq!(refused.status_code, 0);
/// # let _ = ok;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    pub response_time: f64,
    pub request_size: u64,
    pub response_size: u64,
    pub error: Option<String>,
}

impl Observation {
    pub fn new(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        status_code: u16,
        response_time: f64,
    ) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            status_code,
            response_time,
            request_size: 0,
            response_size: 0,
            error: None,
        }
    }

    /// A request that never got a response: status 0, zero response time.
    pub fn transport_failure(
        method: impl Into<String>,
        endpoint: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(method, endpoint, 0, 0.0).with_error(error)
    }

    pub fn with_sizes(mut self, request_size: u64, response_size: u64) -> Self {
        self.request_size = request_size;
        self.response_size = response_size;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn at(self, timestamp: f64) -> RequestMetric {
        RequestMetric {
            timestamp,
            method: self.method,
            endpoint: self.endpoint,
            status_code: self.status_code,
            response_time: self.response_time,
            request_size: self.request_size,
            response_size: self.response_size,
            error: self.error,
        }
    }
}
