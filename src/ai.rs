//! Gemini-backed description and summarization.
//!
//! Entirely decoupled from the sync engine: every failure path collapses to
//! a user-visible placeholder string, and nothing here ever touches the
//! board. Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) from the environment
//! or a `.env` file.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Shown when no API key is configured.
pub const NO_KEY_PLACEHOLDER: &str = "API key not configured. Please set up your environment.";
/// Shown when the API call fails for any reason.
pub const FAILURE_PLACEHOLDER: &str = "Sorry, something went wrong.";
/// Shown for item kinds the AI cannot analyze.
pub const UNSUPPORTED_PLACEHOLDER: &str = "AI analysis is not supported for this item type.";

/// Client for the AI description service.
pub struct Describer {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl Describer {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        if api_key.is_none() {
            tracing::warn!("no Gemini API key found, AI descriptions are disabled");
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        Self::new(api_key)
    }

    /// Summarizes a text snippet; placeholder on any failure.
    pub async fn summarize_text(&self, text: &str) -> String {
        if self.api_key.is_none() {
            return NO_KEY_PLACEHOLDER.to_string();
        }
        match self.generate(text_request(text)).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(%err, "text summarization failed");
                FAILURE_PLACEHOLDER.to_string()
            }
        }
    }

    /// Describes an image payload; placeholder on any failure.
    pub async fn describe_image(&self, media_type: &str, bytes: &[u8]) -> String {
        if self.api_key.is_none() {
            return NO_KEY_PLACEHOLDER.to_string();
        }
        match self.generate(image_request(media_type, bytes)).await {
            Ok(description) => description,
            Err(err) => {
                tracing::warn!(%err, "image description failed");
                FAILURE_PLACEHOLDER.to_string()
            }
        }
    }

    async fn generate(&self, body: serde_json::Value) -> Result<String> {
        let key = self.api_key.as_deref().context("no API key")?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, key
        );

        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text: String = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .flat_map(|candidate| candidate.content.map(|c| c.parts).unwrap_or_default())
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(anyhow!("model returned no text"));
        }
        Ok(text)
    }
}

fn text_request(text: &str) -> serde_json::Value {
    let prompt =
        format!("Summarize the following text in a concise and clear manner:\n\n---\n{text}\n---");
    serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "temperature": 0.3, "topP": 0.9 }
    })
}

fn image_request(media_type: &str, bytes: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [
                { "inline_data": { "mime_type": media_type, "data": BASE64.encode(bytes) } },
                { "text": "Describe this image in detail." }
            ]
        }]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_short_circuits_to_placeholder() {
        let describer = Describer::new(None).expect("client builds without a key");
        assert_eq!(describer.summarize_text("hello").await, NO_KEY_PLACEHOLDER);
        assert_eq!(
            describer.describe_image("image/png", b"pixels").await,
            NO_KEY_PLACEHOLDER
        );
    }

    #[test]
    fn text_request_shape() {
        let body = text_request("hello world");
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
        assert_eq!(body["generationConfig"]["topP"], 0.9);
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("hello world"));
        assert!(prompt.starts_with("Summarize"));
    }

    #[test]
    fn image_request_inlines_base64_payload() {
        let body = image_request("image/png", b"pixels");
        let inline = &body["contents"][0]["parts"][0]["inline_data"];
        assert_eq!(inline["mime_type"], "image/png");
        assert_eq!(inline["data"], BASE64.encode(b"pixels"));
        assert_eq!(
            body["contents"][0]["parts"][1]["text"],
            "Describe this image in detail."
        );
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_none());
    }
}
