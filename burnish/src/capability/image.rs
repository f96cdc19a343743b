//! Serverless inference image backend for `ImageGenerator`.
//!
//! Submits an async invocation for the `fal-ai/fast-sdxl` model and polls
//! the status endpoint until the image is ready, the backend reports failure,
//! or the deadline passes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tracing::debug;

use crate::capability::{GeneratedImage, ImageGenerator};
use crate::error::PipelineError;

const DEFAULT_BASE_URL: &str = "https://inference.do-ai.run/v1";
const MODEL_ID: &str = "fal-ai/fast-sdxl";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Image generation over an async-invoke + poll API.
pub struct InferenceImageGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    deadline: Duration,
}

impl InferenceImageGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            deadline: Duration::from_secs(120),
        }
    }

    /// Build from the environment: loads `.env`, then reads
    /// `GRADIENT_MODEL_ACCESS_KEY`.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenv::dotenv().ok();
        let api_key = std::env::var("GRADIENT_MODEL_ACCESS_KEY").map_err(|_| {
            PipelineError::Generation("GRADIENT_MODEL_ACCESS_KEY not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (builder).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Total time to wait for a result (builder).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Pulls the first image URL out of an output payload. Accepts both
    /// `{"images": [{"url": ...}]}` and `{"images": ["..."]}` shapes.
    fn extract_image_url(output: &serde_json::Value) -> Option<String> {
        let first = output.get("images")?.as_array()?.first()?;
        match first {
            serde_json::Value::String(url) => Some(url.clone()),
            other => other.get("url")?.as_str().map(str::to_string),
        }
    }

    async fn submit(&self, prompt: &str) -> Result<String, PipelineError> {
        let payload = json!({
            "model_id": MODEL_ID,
            "input": {
                "prompt": prompt,
                "num_images": 1,
                "enable_safety_checker": true,
            },
        });
        let response = self
            .client
            .post(format!("{}/async-invoke", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("image submit failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Generation(format!(
                "image API returned {status}"
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Generation(format!("bad submit payload: {e}")))?;
        body.get("request_id")
            .or_else(|| body.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Generation("no request id returned".to_string()))
    }

    async fn poll(&self, request_id: &str, prompt: &str) -> Result<GeneratedImage, PipelineError> {
        let started = Instant::now();
        loop {
            if started.elapsed() >= self.deadline {
                return Err(PipelineError::Generation(format!(
                    "image generation timed out after {:?}",
                    self.deadline
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .client
                .get(format!(
                    "{}/async-invoke/{}/status",
                    self.base_url, request_id
                ))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| PipelineError::Generation(format!("status check failed: {e}")))?;
            if !response.status().is_success() {
                debug!(request_id = %request_id, status = %response.status(), "Status check failed, will retry");
                continue;
            }
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| PipelineError::Generation(format!("bad status payload: {e}")))?;
            let state = body
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_lowercase();

            match state.as_str() {
                "completed" | "succeeded" => {
                    let output = body.get("output").cloned().unwrap_or(json!({}));
                    let url = Self::extract_image_url(&output).ok_or_else(|| {
                        PipelineError::Generation("no images in response".to_string())
                    })?;
                    return Ok(GeneratedImage {
                        url,
                        prompt: prompt.to_string(),
                    });
                }
                "failed" | "error" => {
                    let message = body
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    return Err(PipelineError::Generation(format!(
                        "image generation failed: {message}"
                    )));
                }
                _ => debug!(request_id = %request_id, state = %state, "Image still processing"),
            }
        }
    }
}

#[async_trait]
impl ImageGenerator for InferenceImageGenerator {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Option<&str>,
    ) -> Result<GeneratedImage, PipelineError> {
        let full_prompt = match style {
            Some(style) => format!("{prompt}, {style}"),
            None => prompt.to_string(),
        };
        debug!(prompt_len = full_prompt.len(), "Submitting image generation");
        let request_id = self.submit(&full_prompt).await?;
        debug!(request_id = %request_id, "Image generation submitted");
        self.poll(&request_id, &full_prompt).await
    }
}
