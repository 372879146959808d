//! API models for request and response payloads

use common::editor::CopyField;
use common::{GenerationSettings, MediaItemView};
use serde::{Deserialize, Serialize};

/// One media item plus the transient copied indicator
#[derive(Debug, Serialize)]
pub struct MediaItemResponse {
    #[serde(flatten)]
    pub item: MediaItemView,
    pub copied: Option<CopyField>,
}

/// Response for media listing
#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub items: Vec<MediaItemResponse>,
    pub generating: bool,
}

/// Request for adding a keyword
#[derive(Debug, Deserialize)]
pub struct AddKeywordRequest {
    pub keyword: String,
}

/// Response for a copy action
#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub field: CopyField,
    pub text: String,
}

/// Request for bulk title rewrite
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RewriteTitlesRequest {
    pub prefix: String,
    pub suffix: String,
}

/// Response for bulk title rewrite
#[derive(Debug, Serialize)]
pub struct RewriteTitlesResponse {
    pub updated: usize,
}

/// Request for starting generation
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub settings: Option<GenerationSettings>,
}

/// Response for starting generation
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub queued: usize,
}

/// Generation flag
#[derive(Debug, Serialize)]
pub struct GenerationStatusResponse {
    pub generating: bool,
}

/// Request for adding an API key
#[derive(Debug, Deserialize)]
pub struct AddApiKeyRequest {
    pub key: String,
}
