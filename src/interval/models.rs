use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub target_url: String,
    pub target_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_alert_offsets: Option<Vec<i64>>,
}

impl IntervalRequest {
    pub fn new(target_url: impl Into<String>, target_time: DateTime<Utc>, offsets: &[i64]) -> Self {
        Self {
            target_url: target_url.into(),
            target_time: target_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            user_alert_offsets: if offsets.is_empty() {
                None
            } else {
                Some(offsets.to_vec())
            },
        }
    }
}

/// Server-computed timing for one alarm. Only `optimal_refresh_time` drives
/// the countdown; the rest is carried through for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalCalculationResult {
    pub optimal_refresh_time: DateTime<Utc>,
    #[serde(default)]
    pub refresh_interval: f64,
    #[serde(default)]
    pub alert_settings: Vec<serde_json::Value>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub network_analysis: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntervalEnvelope {
    #[serde(default)]
    pub success: bool,
    pub data: Option<IntervalCalculationResult>,
    pub error: Option<String>,
}
