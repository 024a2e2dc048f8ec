//! Ollama backend
//!
//! Sends the ledger snapshot as a single non-streaming `/api/generate`
//! request and interprets the returned text with [`parse_response`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::{build_prompt, parse_response, InsightBackend, InsightResponse, InsightSnapshot};

/// Ollama HTTP backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl InsightBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, snapshot: &InsightSnapshot) -> Result<InsightResponse> {
        let request = OllamaRequest {
            model: &self.model,
            prompt: build_prompt(snapshot)?,
            stream: false,
        };

        debug!("Requesting insights from {} ({})", self.base_url, self.model);
        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: OllamaResponse = response.json().await?;
        Ok(parse_response(&body.response))
    }
}
