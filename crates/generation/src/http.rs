//! Prediction-API backend over HTTP.
//!
//! Model ids of the form `owner/name:version` are posted to
//! `{base}/predictions` with an explicit version; bare `owner/name` ids go to
//! `{base}/models/owner/name/predictions`. Requests ask the server to hold the
//! connection until the prediction settles (`Prefer: wait`).

use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::GenerationClientConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{GenerationBackend, GenerationError};

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct HttpGenerationBackend {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(config: &GenerationClientConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Endpoint and body for a model id.
    pub fn prediction_request(&self, model_id: &str, input: &Value) -> (String, Value) {
        match model_id.split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/predictions", self.base_url, model_id),
                json!({ "input": input }),
            ),
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn run(&self, model_id: &str, input: &Value) -> Result<Option<Value>, GenerationError> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| GenerationError::NotConfigured("api_token is not set".into()))?;

        let (url, body) = self.prediction_request(model_id, input);
        debug!(url = %url, model = %model_id, "Submitting prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let prediction: PredictionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if let Some(err) = prediction.error.filter(|e| !e.is_null()) {
            let message = match err {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(GenerationError::Backend(message));
        }
        if let Some(status) = prediction.status.as_deref() {
            if matches!(status, "failed" | "canceled") {
                return Err(GenerationError::Backend(format!("prediction {}", status)));
            }
        }

        Ok(prediction.output.filter(|o| !o.is_null()))
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}
