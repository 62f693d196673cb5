//! Target-server time comparison.
//!
//! The backend queries the target site and reports its corrected clock. The
//! offset between that clock and the moment we sent the request lets the
//! countdown run on the target server's time instead of ours.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::interval::client::join_url;

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("time compare endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("time comparison failed: {0}")]
    Rejected(String),

    #[error("'{0}' is not an http(s) URL")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeComparison {
    #[serde(default)]
    pub our_server_time: Option<String>,
    #[serde(default)]
    pub target_server_time: Option<String>,
    pub corrected_target_time: DateTime<Utc>,
    /// Our server minus the target server, in milliseconds.
    #[serde(default)]
    pub time_difference: f64,
    #[serde(default)]
    pub time_difference_formatted: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub rtt: f64,
    #[serde(default)]
    pub network_delay: f64,
    #[serde(default)]
    pub reliability: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub accuracy: Option<String>,
    pub recommendation: Option<String>,
    pub trust_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementMetadata {
    pub measured_at: Option<String>,
    pub ntp_sync_status: Option<String>,
    pub ntp_accuracy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeCompareData {
    pub time_comparison: Option<TimeComparison>,
    pub network_info: Option<NetworkInfo>,
    pub analysis: Option<Analysis>,
    pub metadata: Option<MeasurementMetadata>,
}

#[derive(Debug, Deserialize)]
struct CompareEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<TimeCompareData>,
    error: Option<String>,
}

/// One comparison, stamped with when we asked.
#[derive(Debug, Clone)]
pub struct ServerTimeReading {
    pub url: String,
    pub client_time: DateTime<Utc>,
    pub round_trip_ms: i64,
    pub data: TimeCompareData,
}

impl ServerTimeReading {
    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    /// e.g. `ticket.example.com is 120.00ms ahead`.
    pub fn describe(&self) -> Option<String> {
        let comparison = self.data.time_comparison.as_ref()?;
        let direction = match comparison.direction.as_deref() {
            Some("ahead") => "ahead",
            _ => "behind",
        };
        Some(format!(
            "{} is {} {}",
            self.host(),
            time_difference_text(comparison.time_difference.abs()),
            direction
        ))
    }

    /// RTT and network delay as reported by the backend, plus the
    /// round trip we measured ourselves.
    pub fn network_summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(network) = &self.data.network_info {
            parts.push(format!("RTT {:.1}ms", network.rtt));
            if network.network_delay > 0.0 {
                parts.push(format!("network delay {:.1}ms", network.network_delay));
            }
        }
        parts.push(format!("processing {}ms", self.round_trip_ms));
        parts.join(", ")
    }
}

/// `HH:MM:SS.mmm`
pub fn format_clock_time(time: DateTime<Local>) -> String {
    time.format("%H:%M:%S%.3f").to_string()
}

pub fn time_difference_text(diff_ms: f64) -> String {
    if diff_ms.abs() < 1000.0 {
        format!("{diff_ms:.2}ms")
    } else {
        format!("{:.2}s (±{:.2}s)", diff_ms / 1000.0, diff_ms.abs() / 1000.0)
    }
}

pub fn is_http_url(input: &str) -> bool {
    reqwest::Url::parse(input)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct TimeCompareClient {
    url: String,
    client: reqwest::Client,
}

impl TimeCompareClient {
    pub fn new(api_base: &str, path: &str) -> Self {
        Self {
            url: join_url(api_base, path),
            client: reqwest::Client::new(),
        }
    }

    pub async fn compare(&self, target_url: &str) -> Result<ServerTimeReading, CompareError> {
        let target_url = target_url.trim();
        if !is_http_url(target_url) {
            return Err(CompareError::InvalidUrl(target_url.to_string()));
        }

        let client_time = Utc::now();
        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "targetUrl": target_url }))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CompareError::Status { status, body });
        }

        let envelope: CompareEnvelope = response.json().await?;
        let round_trip_ms = started.elapsed().as_millis() as i64;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(ServerTimeReading {
                url: target_url.to_string(),
                client_time,
                round_trip_ms,
                data,
            }),
            _ => Err(CompareError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| "server time comparison failed".to_string()),
            )),
        }
    }
}

/// Local clock shifted onto the target server's corrected time.
#[derive(Clone)]
pub struct ServerClock {
    base: Arc<dyn Clock>,
    offset: Duration,
}

impl ServerClock {
    pub fn new(base: Arc<dyn Clock>, offset: Duration) -> Self {
        Self { base, offset }
    }

    /// `None` when the reading carries no corrected server time.
    pub fn from_reading(base: Arc<dyn Clock>, reading: &ServerTimeReading) -> Option<Self> {
        let corrected = reading.data.time_comparison.as_ref()?.corrected_target_time;
        Some(Self::new(base, corrected - reading.client_time))
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// The server's current time, formatted for display.
    pub fn display_now(&self) -> String {
        format_clock_time(self.now())
    }
}

impl Clock for ServerClock {
    fn now(&self) -> DateTime<Local> {
        self.base.now() + self.offset
    }
}
