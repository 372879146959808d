//! State-owning store for the media collection
//!
//! The store is the single owner of every media item, its preview and the
//! cosmetic API key list. Callers read snapshots and mutate through discrete
//! commands; each command holds the lock for its whole duration so a
//! per-item update is applied atomically.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::editor::apply_title_affixes;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    ApiKey, ApiKeyView, INITIAL_KEY_USAGE, MediaFile, MediaId, MediaItem, MediaItemView,
    MediaState, MediaStatus, Metadata,
};
use crate::preview::{PreviewEntry, PreviewRegistry};

/// Title/description commit from the editor; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataEdit {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    items: Vec<MediaItem>,
    previews: PreviewRegistry,
    api_keys: Vec<ApiKey>,
}

impl StoreInner {
    fn find_mut(&mut self, id: &MediaId) -> StoreResult<&mut MediaItem> {
        self.items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn unique_id(&self, base: MediaId) -> MediaId {
        let taken = |candidate: &MediaId| self.items.iter().any(|item| &item.id == candidate);
        if !taken(&base) {
            return base;
        }

        let mut n = 2;
        loop {
            let candidate = base.with_suffix(n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Apply an edit to a completed item's metadata and bump its revision
    fn edit<F>(&mut self, id: &MediaId, f: F) -> StoreResult<MediaItemView>
    where
        F: FnOnce(&mut Metadata) -> StoreResult<()>,
    {
        let item = self.find_mut(id)?;
        let status = item.status();
        let MediaState::Completed(metadata) = &mut item.state else {
            return Err(StoreError::NotEditable {
                id: id.clone(),
                status,
            });
        };

        f(metadata)?;
        item.revision += 1;
        Ok(item.view())
    }
}

/// Shared handle to the media collection
#[derive(Debug, Clone, Default)]
pub struct MediaStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files as pending items, in order, allocating a preview for each
    pub async fn append(&self, files: Vec<MediaFile>) -> Vec<MediaId> {
        self.append_bounded(files, None).await.0
    }

    /// Append files while the collection holds fewer than `max_items`
    ///
    /// Files that do not fit are handed back in their original order.
    pub async fn append_bounded(
        &self,
        files: Vec<MediaFile>,
        max_items: Option<usize>,
    ) -> (Vec<MediaId>, Vec<MediaFile>) {
        let mut inner = self.inner.write().await;
        let mut ids = Vec::with_capacity(files.len());
        let mut overflow = Vec::new();

        for file in files {
            if max_items.is_some_and(|max| inner.items.len() >= max) {
                overflow.push(file);
                continue;
            }

            let created_at = Utc::now();
            let id = inner.unique_id(MediaId::derive(&file.name, created_at));
            let preview = inner.previews.allocate(&file);

            debug!("Added media item {} ({} bytes)", id, file.size());
            inner.items.push(MediaItem {
                id: id.clone(),
                file,
                preview,
                created_at,
                state: MediaState::Pending,
                revision: 0,
            });
            ids.push(id);
        }

        (ids, overflow)
    }

    /// Snapshot of all items in insertion order
    pub async fn snapshot(&self) -> Vec<MediaItemView> {
        let inner = self.inner.read().await;
        inner.items.iter().map(MediaItem::view).collect()
    }

    pub async fn get(&self, id: &MediaId) -> StoreResult<MediaItemView> {
        let inner = self.inner.read().await;
        inner
            .items
            .iter()
            .find(|item| &item.id == id)
            .map(MediaItem::view)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }

    /// Ids of pending items in insertion order
    pub async fn pending_ids(&self) -> Vec<MediaId> {
        let inner = self.inner.read().await;
        inner
            .items
            .iter()
            .filter(|item| item.status() == MediaStatus::Pending)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Move a pending item to processing and hand out its file
    pub async fn begin_processing(&self, id: &MediaId) -> StoreResult<MediaFile> {
        let mut inner = self.inner.write().await;
        let item = inner.find_mut(id)?;

        if item.state != MediaState::Pending {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: item.status(),
                to: MediaStatus::Processing,
            });
        }

        item.state = MediaState::Processing;
        Ok(item.file.clone())
    }

    /// Record a successful generation
    pub async fn complete(&self, id: &MediaId, metadata: Metadata) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let item = inner.find_mut(id)?;

        if item.state != MediaState::Processing {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: item.status(),
                to: MediaStatus::Completed,
            });
        }

        item.state = MediaState::Completed(metadata);
        item.revision += 1;
        Ok(())
    }

    /// Record a failed generation
    pub async fn fail(&self, id: &MediaId, message: impl Into<String>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let item = inner.find_mut(id)?;

        if item.state != MediaState::Processing {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: item.status(),
                to: MediaStatus::Error,
            });
        }

        item.state = MediaState::Error(message.into());
        Ok(())
    }

    /// Commit edited title and/or description
    pub async fn update_fields(&self, id: &MediaId, edit: MetadataEdit) -> StoreResult<MediaItemView> {
        let mut inner = self.inner.write().await;
        inner.edit(id, |metadata| {
            if let Some(title) = edit.title {
                metadata.title = title;
            }
            if let Some(description) = edit.description {
                metadata.description = description;
            }
            Ok(())
        })
    }

    /// Append a keyword; surrounding whitespace is trimmed
    pub async fn add_keyword(&self, id: &MediaId, keyword: &str) -> StoreResult<MediaItemView> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(StoreError::EmptyKeyword);
        }

        let mut inner = self.inner.write().await;
        inner.edit(id, |metadata| {
            metadata.keywords.push(keyword.to_string());
            Ok(())
        })
    }

    /// Remove the keyword at `index`, keeping the others in order
    pub async fn remove_keyword(&self, id: &MediaId, index: usize) -> StoreResult<MediaItemView> {
        let mut inner = self.inner.write().await;
        inner.edit(id, |metadata| {
            if index >= metadata.keywords.len() {
                return Err(StoreError::KeywordIndexOutOfRange {
                    index,
                    len: metadata.keywords.len(),
                });
            }
            metadata.keywords.remove(index);
            Ok(())
        })
    }

    /// Delete an item and release its preview
    pub async fn delete(&self, id: &MediaId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let position = inner
            .items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let item = inner.items.remove(position);
        inner.previews.release(&item.preview);
        info!("Deleted media item {}", id);
        Ok(())
    }

    /// Rewrite every completed title to `prefix + title + suffix`
    ///
    /// Returns the number of rewritten items.
    pub async fn rewrite_titles(&self, prefix: &str, suffix: &str) -> usize {
        let mut inner = self.inner.write().await;
        let mut updated = 0;

        for item in inner.items.iter_mut() {
            if let MediaState::Completed(metadata) = &mut item.state {
                apply_title_affixes(metadata, prefix, suffix);
                item.revision += 1;
                updated += 1;
            }
        }

        info!("Rewrote {} titles", updated);
        updated
    }

    pub async fn resolve_preview(&self, token: Uuid) -> Option<PreviewEntry> {
        self.inner.read().await.previews.resolve(token)
    }

    /// Number of previews still held
    pub async fn preview_count(&self) -> usize {
        self.inner.read().await.previews.len()
    }

    /// Add an API key to the list. Blank input is ignored.
    ///
    /// The first key added becomes the active one.
    pub async fn add_api_key(&self, key: &str) -> Option<ApiKeyView> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }

        let mut inner = self.inner.write().await;
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            key: key.to_string(),
            is_active: inner.api_keys.is_empty(),
            usage: INITIAL_KEY_USAGE,
        };
        let view = api_key.view();
        inner.api_keys.push(api_key);
        Some(view)
    }

    pub async fn remove_api_key(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.api_keys.len();
        inner.api_keys.retain(|key| key.id != id);
        inner.api_keys.len() != before
    }

    pub async fn api_keys(&self) -> Vec<ApiKeyView> {
        let inner = self.inner.read().await;
        inner.api_keys.iter().map(ApiKey::view).collect()
    }
}
