//! Metadata generation client
//!
//! `MetadataGenerator` is the seam between the orchestrator and the model
//! provider. `GeminiClient` implements it against the Gemini
//! `generateContent` REST endpoint with a structured-output schema.

use async_trait::async_trait;
use common::config::ModelConfig;
use common::{GenerationSettings, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::encoding::EncodedMedia;
use crate::error::GenerationError;
use crate::prompt::{build_instruction, response_schema};

/// Value shipped in sample env files; treated as a missing key
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Generates title/description/keywords for one encoded media payload
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    async fn generate(
        &self,
        media: &EncodedMedia,
        settings: &GenerationSettings,
    ) -> Result<Metadata, GenerationError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

/// Gemini endpoint and credential
#[derive(Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl GeminiConfig {
    pub fn new(model: &ModelConfig, api_key: Option<String>) -> Self {
        Self {
            base_url: model.base_url.clone(),
            model: model.model.clone(),
            api_key,
        }
    }

    /// Read the process credential
    ///
    /// # Environment Variables
    /// - `GEMINI_API_KEY`: preferred
    /// - `API_KEY`: fallback
    ///
    /// Blank values are skipped.
    pub fn api_key_from_env() -> Option<String> {
        ["GEMINI_API_KEY", "API_KEY"]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|key| !key.trim().is_empty())
    }

    /// Whether a usable credential is present
    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    InlineData(InlineData),
    Text(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Parse and shape-check the model's JSON answer
pub fn parse_metadata(text: &str) -> Result<Metadata, GenerationError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| GenerationError::Generation(format!("response is not valid JSON: {}", e)))?;

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::InvalidFormat("title is not a string".to_string()))?;

    let description = value
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::InvalidFormat("description is not a string".to_string()))?;

    let keywords = value
        .get("keywords")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::InvalidFormat("keywords is not an array".to_string()))?
        .iter()
        .map(|keyword| {
            keyword.as_str().map(str::to_string).ok_or_else(|| {
                GenerationError::InvalidFormat("keywords must be strings".to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Metadata {
        title: title.to_string(),
        description: description.to_string(),
        keywords,
    })
}

/// Gemini-backed generator
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl MetadataGenerator for GeminiClient {
    async fn generate(
        &self,
        media: &EncodedMedia,
        settings: &GenerationSettings,
    ) -> Result<Metadata, GenerationError> {
        let api_key = self.config.credential().ok_or(GenerationError::Configuration)?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData(InlineData {
                        mime_type: media.mime_type.clone(),
                        data: media.data.clone(),
                    }),
                    Part::Text(build_instruction(settings)),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        debug!(
            "Calling {} with {} bytes of {}",
            self.config.model,
            media.len(),
            media.mime_type
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {}", e);
                GenerationError::Generation(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API returned {}: {}", status, body);
            return Err(GenerationError::Generation(format!(
                "API returned {}",
                status
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            GenerationError::Generation(format!("failed to parse response: {}", e))
        })?;

        let text = body.text().ok_or_else(|| {
            GenerationError::Generation("response contained no text".to_string())
        })?;

        parse_metadata(&text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
