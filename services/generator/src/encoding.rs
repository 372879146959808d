//! Payload encoding for the model request

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::MediaFile;

/// Base64 payload plus its MIME type, as sent inline to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub data: String,
    pub mime_type: String,
}

impl EncodedMedia {
    pub fn encode(file: &MediaFile) -> Self {
        Self {
            data: STANDARD.encode(file.data.as_slice()),
            mime_type: file.mime_type.clone(),
        }
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
