use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

/// Client for the Cloudflare Workers AI LLaVA model.
pub struct InferenceClient {
    http: Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

#[derive(Deserialize)]
struct LlavaResponse {
    result: LlavaResult,
}

#[derive(Deserialize)]
struct LlavaResult {
    description: String,
}

const INGREDIENT_PROMPT: &str = concat!(
    "Read the ingredients panel on this nutrition label image. ",
    "For every listed ingredient, classify it as high_risk, moderate_risk, or healthy ",
    "based on current nutrition science, with a one-sentence explanation. ",
    "Return ONLY valid JSON of the shape ",
    "{\"ingredients\": [{\"name\": \"...\", \"classification\": \"...\", \"explanation\": \"...\"}]}. ",
    "classification must be exactly one of: high_risk, moderate_risk, healthy."
);

impl InferenceClient {
    pub fn new(
        base_url: &str,
        account_id: &str,
        api_token: &str,
        timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Send a label image to LLaVA and return the raw model text. The text is
    /// expected to be JSON but frequently arrives fenced or wrapped in prose;
    /// extraction and validation live in [`crate::services::analysis`].
    pub async fn describe_label(&self, image_bytes: &[u8]) -> Result<String, InferenceError> {
        let url = format!(
            "{}/accounts/{}/ai/run/@cf/llava-hf/llava-1.5-7b-hf",
            self.base_url, self.account_id
        );

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_bytes),
            "prompt": INGREDIENT_PROMPT,
            "max_tokens": 1024
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let llava: LlavaResponse = response.json().await?;
        Ok(llava.result.description)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("HTTP request to Workers AI failed: {0}")]
    Http(#[from] reqwest::Error),
}
