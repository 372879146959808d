//! Data model for uploaded media and their generated metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::SettingsError;
use crate::preview::PreviewRef;

/// Identity of a media item, derived from its filename and creation time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Build an id from the uploaded filename and the intake timestamp
    ///
    /// Characters that are not URL-path safe are replaced so the id can be
    /// used as a single path segment.
    pub fn derive(filename: &str, created_at: DateTime<Utc>) -> Self {
        let mut name = String::with_capacity(filename.len());
        for c in filename.trim().chars() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                name.push(c);
            } else if !name.ends_with('_') {
                name.push('_');
            }
        }
        if name.is_empty() {
            name.push_str("upload");
        }
        Self(format!(
            "{}-{}",
            name,
            created_at.format("%Y%m%dT%H%M%S%.3fZ")
        ))
    }

    /// Append a numeric suffix, used when two uploads collide on the same id
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}-{}", self.0, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MediaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Generated (and possibly user-edited) metadata for one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Status together with the data that is only meaningful in that status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaState {
    Pending,
    Processing,
    Completed(Metadata),
    Error(String),
}

impl MediaState {
    pub fn status(&self) -> MediaStatus {
        match self {
            MediaState::Pending => MediaStatus::Pending,
            MediaState::Processing => MediaStatus::Processing,
            MediaState::Completed(_) => MediaStatus::Completed,
            MediaState::Error(_) => MediaStatus::Error,
        }
    }
}

/// An uploaded file held in memory
#[derive(Clone)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub data: Arc<Vec<u8>>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: Arc::new(data),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// One uploaded file plus its generation lifecycle state
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: MediaId,
    pub file: MediaFile,
    pub preview: PreviewRef,
    pub created_at: DateTime<Utc>,
    pub state: MediaState,
    /// Bumped on every metadata change
    pub revision: u64,
}

impl MediaItem {
    pub fn status(&self) -> MediaStatus {
        self.state.status()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match &self.state {
            MediaState::Completed(metadata) => Some(metadata),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            MediaState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn view(&self) -> MediaItemView {
        MediaItemView {
            id: self.id.clone(),
            filename: self.file.name.clone(),
            mime_type: self.file.mime_type.clone(),
            size_bytes: self.file.size(),
            preview_url: self.preview.url(),
            status: self.status(),
            metadata: self.metadata().cloned(),
            error: self.error().map(str::to_string),
            revision: self.revision,
            created_at: self.created_at,
        }
    }
}

/// Read snapshot of a media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItemView {
    pub id: MediaId,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub preview_url: String,
    pub status: MediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

/// Settings for a generation run
///
/// Only `title_length` and `keyword_count` reach the prompt; the remaining
/// fields are accepted and carried along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub title_length: u32,
    pub keyword_count: u32,
    pub custom_prompt: String,
    pub prohibited_words: String,
    pub transparent_background: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            title_length: 150,
            keyword_count: 20,
            custom_prompt: String::new(),
            prohibited_words: String::new(),
            transparent_background: false,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.title_length == 0 {
            return Err(SettingsError::Invalid {
                field: "title_length",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.keyword_count == 0 {
            return Err(SettingsError::Invalid {
                field: "keyword_count",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Usage counter shown for a freshly added key
pub const INITIAL_KEY_USAGE: u64 = 1500;

/// A user-supplied API key
///
/// Listed in the UI only; generation always uses the process credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Uuid,
    pub key: String,
    pub is_active: bool,
    pub usage: u64,
}

impl ApiKey {
    pub fn view(&self) -> ApiKeyView {
        let visible: String = {
            let chars: Vec<char> = self.key.chars().collect();
            let start = chars.len().saturating_sub(4);
            chars[start..].iter().collect()
        };

        ApiKeyView {
            id: self.id,
            masked_key: format!("****{}", visible),
            is_active: self.is_active,
            usage: self.usage,
        }
    }
}

/// API key as shown to clients, secret masked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyView {
    pub id: Uuid,
    pub masked_key: String,
    pub is_active: bool,
    pub usage: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_media_id_derived_from_filename_and_time() {
        let id = MediaId::derive("sunset.jpg", timestamp());
        assert_eq!(id.as_str(), "sunset.jpg-20250314T092653.000Z");
    }

    #[test]
    fn test_media_id_replaces_path_unsafe_characters() {
        let id = MediaId::derive("my holiday/photo?.png", timestamp());
        assert_eq!(id.as_str(), "my_holiday_photo_.png-20250314T092653.000Z");

        let id = MediaId::derive("   ", timestamp());
        assert!(id.as_str().starts_with("upload-"));
    }

    #[test]
    fn test_media_id_suffix() {
        let id = MediaId::derive("a.png", timestamp()).with_suffix(2);
        assert!(id.as_str().ends_with("-2"));
    }

    #[test]
    fn test_state_determines_meaningful_fields() {
        let states = [
            MediaState::Pending,
            MediaState::Processing,
            MediaState::Completed(Metadata::default()),
            MediaState::Error("boom".to_string()),
        ];

        for state in states {
            let item = MediaItem {
                id: MediaId::from("x"),
                file: MediaFile::new("x.png", "image/png", vec![1, 2, 3]),
                preview: PreviewRef::new(),
                created_at: timestamp(),
                state,
                revision: 0,
            };
            assert!(!(item.metadata().is_some() && item.error().is_some()));
            assert_eq!(item.metadata().is_some(), item.status() == MediaStatus::Completed);
            assert_eq!(item.error().is_some(), item.status() == MediaStatus::Error);
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(MediaStatus::Processing).unwrap();
        assert_eq!(json, "processing");
        assert_eq!(MediaStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_settings_defaults_and_validation() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.title_length, 150);
        assert_eq!(settings.keyword_count, 20);
        assert!(settings.validate().is_ok());

        let settings: GenerationSettings =
            serde_json::from_str(r#"{"keyword_count": 0}"#).unwrap();
        assert_eq!(settings.title_length, 150);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_api_key_view_masks_secret() {
        let key = ApiKey {
            id: Uuid::new_v4(),
            key: "AIzaSyExampleSecret1234".to_string(),
            is_active: true,
            usage: INITIAL_KEY_USAGE,
        };
        let view = key.view();
        assert_eq!(view.masked_key, "****1234");
        assert!(!view.masked_key.contains("AIza"));
    }
}
