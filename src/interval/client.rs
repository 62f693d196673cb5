use super::models::{IntervalCalculationResult, IntervalEnvelope, IntervalRequest};
use super::{IntervalCalculator, IntervalError};

#[derive(Debug, Clone)]
pub struct HttpIntervalClient {
    url: String,
    client: reqwest::Client,
}

impl HttpIntervalClient {
    /// `api_base` and `path` are joined as-is, minus a doubled slash.
    pub fn new(api_base: &str, path: &str) -> Self {
        Self::with_client(api_base, path, reqwest::Client::new())
    }

    pub fn with_client(api_base: &str, path: &str, client: reqwest::Client) -> Self {
        Self {
            url: join_url(api_base, path),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IntervalCalculator for HttpIntervalClient {
    async fn calculate(
        &self,
        request: &IntervalRequest,
    ) -> Result<IntervalCalculationResult, IntervalError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            log::warn!("interval endpoint {} returned {}: {}", self.url, status, body);
            return Err(IntervalError::Status { status, body });
        }

        let envelope: IntervalEnvelope = response.json().await?;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => {
                log::debug!(
                    "interval calculated for {}: refresh at {} (confidence {:.2})",
                    request.target_url,
                    data.optimal_refresh_time,
                    data.confidence
                );
                Ok(data)
            }
            (_, _) => Err(IntervalError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| "response carried no calculation".to_string()),
            )),
        }
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
