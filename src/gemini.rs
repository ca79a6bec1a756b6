use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    config::GeminiSettings,
    models::{DataUri, GenerationResult},
};

/// MIME type declared for every inline source image we send.
pub const INLINE_MIME_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
}

/// One multimodal call: a source image plus instructions in, maybe an image out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// `Ok(None)` means the call succeeded but no image part came back.
    async fn generate_image(
        &self,
        source: &DataUri,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Option<GenerationResult>, GeminiError>;
}

/// One text-only call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", s.chars().take(50).collect::<String>(), s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable_body(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(mut value) => {
            truncate_base64_in_json(&mut value);
            value.to_string()
        }
        Err(_) if raw.len() > 1000 => format!("{}...", raw.chars().take(1000).collect::<String>()),
        Err(_) => raw.to_string(),
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    image_model: String,
    text_model: String,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            image_model: settings.image_model.clone(),
            text_model: settings.text_model.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key)
    }

    async fn post_generate(&self, model: &str, body: &serde_json::Value) -> Result<GeminiResponse, GeminiError> {
        let url = self.endpoint(model);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response
            .text()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", loggable_body(&response_text));
            return Err(GeminiError::Api { status: status.as_u16(), body: response_text });
        }

        info!("📥 Raw Gemini API response: {}", loggable_body(&response_text));

        serde_json::from_str(&response_text).map_err(|e| GeminiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(
        &self,
        source: &DataUri,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Option<GenerationResult>, GeminiError> {
        let request_body = json!({
            "contents": [{
                "parts": [
                    {"inlineData": {"mimeType": INLINE_MIME_TYPE, "data": source.data()}},
                    {"text": prompt}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {"aspectRatio": aspect_ratio}
            }
        });

        let prompt_preview: String = prompt.chars().take(100).collect();
        info!("🎯 Generating image from {} with prompt: {}", source.preview(), prompt_preview);
        let parsed = self.post_generate(&self.image_model, &request_body).await?;

        let result = decode_image_response(&parsed);
        match &result {
            Some(r) => info!("🖼️ Extracted image from API response: {}", r.image.preview()),
            None => warn!("⚠️ No image data found in API response"),
        }
        Ok(result)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GeminiError> {
        info!("Generating text with Gemini API...");
        let payload = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }]
        });
        let parsed = self.post_generate(&self.text_model, &payload).await?;
        Ok(decode_text_response(&parsed))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

fn first_parts(resp: &GeminiResponse) -> &[Part] {
    resp.candidates.first().map(|c| c.content.parts.as_slice()).unwrap_or(&[])
}

/// Scans every part of the first candidate. The last image part wins; text parts are joined in order.
pub(crate) fn decode_image_response(resp: &GeminiResponse) -> Option<GenerationResult> {
    let mut image = None;
    let mut description = String::new();
    for part in first_parts(resp) {
        match part {
            Part::Inline { inline_data } => {
                let mime = inline_data.mime_type.as_deref().unwrap_or(INLINE_MIME_TYPE);
                image = Some(DataUri::from_base64(mime, inline_data.data.clone()));
            }
            Part::Text { text } => description.push_str(text),
            Part::Other(_) => {}
        }
    }
    image.map(|image| GenerationResult {
        variation: 0,
        image,
        description: (!description.is_empty()).then_some(description),
    })
}

pub(crate) fn decode_text_response(resp: &GeminiResponse) -> String {
    first_parts(resp)
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
