//! Locally-resolvable previews for uploaded media
//!
//! Every item gets a preview token on intake. The token resolves to the
//! original bytes until the item is deleted, at which point the entry is
//! released.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::MediaFile;

/// Handle to a registered preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewRef(Uuid);

impl PreviewRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn token(&self) -> Uuid {
        self.0
    }

    /// Path under which the HTTP surface serves this preview
    pub fn url(&self) -> String {
        format!("/previews/{}", self.0)
    }
}

impl Default for PreviewRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes and content type behind a preview token
#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub mime_type: String,
    pub data: Arc<Vec<u8>>,
}

/// Registry of live previews
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    entries: HashMap<Uuid, PreviewEntry>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview for the file; shares the file's buffer
    pub fn allocate(&mut self, file: &MediaFile) -> PreviewRef {
        let preview = PreviewRef::new();
        self.entries.insert(
            preview.token(),
            PreviewEntry {
                mime_type: file.mime_type.clone(),
                data: Arc::clone(&file.data),
            },
        );
        preview
    }

    pub fn resolve(&self, token: Uuid) -> Option<PreviewEntry> {
        self.entries.get(&token).cloned()
    }

    /// Release a preview. Returns false if it was already gone.
    pub fn release(&mut self, preview: &PreviewRef) -> bool {
        self.entries.remove(&preview.token()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_resolve_release() {
        let mut registry = PreviewRegistry::new();
        let file = MediaFile::new("cat.png", "image/png", vec![0x89, 0x50]);

        let preview = registry.allocate(&file);
        assert_eq!(registry.len(), 1);
        assert!(preview.url().starts_with("/previews/"));

        let entry = registry.resolve(preview.token()).expect("preview should resolve");
        assert_eq!(entry.mime_type, "image/png");
        assert!(Arc::ptr_eq(&entry.data, &file.data));

        assert!(registry.release(&preview));
        assert!(!registry.release(&preview));
        assert!(registry.resolve(preview.token()).is_none());
        assert!(registry.is_empty());
    }
}
