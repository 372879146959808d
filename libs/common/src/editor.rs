//! Metadata editing model
//!
//! A `MetadataDraft` is the editor's local copy of one item's metadata.
//! Title and description edits stay in the draft until `commit` (the
//! focus-loss commit); keyword changes go to the store immediately. The
//! draft re-seeds itself whenever the stored metadata revision moves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::StoreResult;
use crate::models::{MediaId, MediaItemView, Metadata};
use crate::store::{MediaStore, MetadataEdit};

/// How long a field shows as copied
pub const COPIED_WINDOW: Duration = Duration::from_secs(2);

/// Rewrite a title in place to `prefix + title + suffix`
pub fn apply_title_affixes(metadata: &mut Metadata, prefix: &str, suffix: &str) {
    metadata.title = format!("{}{}{}", prefix, metadata.title, suffix);
}

/// Field that can be copied to the clipboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyField {
    Title,
    Description,
    Keywords,
}

impl CopyField {
    /// Clipboard text for this field; keywords are joined with ", "
    pub fn text(&self, metadata: &Metadata) -> String {
        match self {
            CopyField::Title => metadata.title.clone(),
            CopyField::Description => metadata.description.clone(),
            CopyField::Keywords => metadata.keywords.join(", "),
        }
    }
}

impl fmt::Display for CopyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CopyField::Title => "title",
            CopyField::Description => "description",
            CopyField::Keywords => "keywords",
        };
        f.write_str(s)
    }
}

impl FromStr for CopyField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(CopyField::Title),
            "description" => Ok(CopyField::Description),
            "keywords" => Ok(CopyField::Keywords),
            other => Err(format!("Unknown field: {}", other)),
        }
    }
}

/// Transient "copied" indicator, one field per item
#[derive(Debug, Clone)]
pub struct CopyTracker {
    window: Duration,
    marks: HashMap<MediaId, (CopyField, Instant)>,
}

impl Default for CopyTracker {
    fn default() -> Self {
        Self::new(COPIED_WINDOW)
    }
}

impl CopyTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            marks: HashMap::new(),
        }
    }

    pub fn mark(&mut self, id: &MediaId, field: CopyField) {
        self.mark_at(id, field, Instant::now());
    }

    /// A newer copy on the same item replaces the older mark
    pub fn mark_at(&mut self, id: &MediaId, field: CopyField, now: Instant) {
        self.prune(now);
        self.marks.insert(id.clone(), (field, now));
    }

    pub fn active(&self, id: &MediaId) -> Option<CopyField> {
        self.active_at(id, Instant::now())
    }

    pub fn active_at(&self, id: &MediaId, now: Instant) -> Option<CopyField> {
        self.marks
            .get(id)
            .filter(|(_, at)| now.saturating_duration_since(*at) < self.window)
            .map(|(field, _)| *field)
    }

    pub fn forget(&mut self, id: &MediaId) {
        self.marks.remove(id);
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.marks
            .retain(|_, (_, at)| now.saturating_duration_since(*at) < window);
    }
}

/// Local editing state for one item
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDraft {
    id: MediaId,
    revision: u64,
    pub title: String,
    pub description: String,
    keywords: Vec<String>,
}

impl MetadataDraft {
    /// Seed from the item's current metadata (empty fields if it has none)
    pub fn seed(view: &MediaItemView) -> Self {
        let metadata = view.metadata.clone().unwrap_or_default();
        Self {
            id: view.id.clone(),
            revision: view.revision,
            title: metadata.title,
            description: metadata.description,
            keywords: metadata.keywords,
        }
    }

    /// Re-seed if the stored metadata changed since the draft was seeded.
    ///
    /// Returns true when the draft was replaced.
    pub fn sync(&mut self, view: &MediaItemView) -> bool {
        if view.id == self.id && view.revision == self.revision {
            return false;
        }
        *self = Self::seed(view);
        true
    }

    pub fn id(&self) -> &MediaId {
        &self.id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Commit title and description to the store
    pub async fn commit(&mut self, store: &MediaStore) -> StoreResult<()> {
        let edit = MetadataEdit {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
        };
        let view = store.update_fields(&self.id, edit).await?;
        self.revision = view.revision;
        Ok(())
    }

    /// Add a keyword and commit it right away
    pub async fn add_keyword(&mut self, store: &MediaStore, keyword: &str) -> StoreResult<()> {
        let view = store.add_keyword(&self.id, keyword).await?;
        self.adopt_keywords(&view);
        Ok(())
    }

    /// Remove the keyword at `index` and commit right away
    pub async fn remove_keyword(&mut self, store: &MediaStore, index: usize) -> StoreResult<()> {
        let view = store.remove_keyword(&self.id, index).await?;
        self.adopt_keywords(&view);
        Ok(())
    }

    /// Take the stored keyword list without discarding uncommitted text edits
    fn adopt_keywords(&mut self, view: &MediaItemView) {
        if let Some(metadata) = &view.metadata {
            self.keywords = metadata.keywords.clone();
        }
        self.revision = view.revision;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaFile, MediaStatus};

    fn metadata() -> Metadata {
        Metadata {
            title: "Red fox".to_string(),
            description: "A fox in snow.".to_string(),
            keywords: vec!["fox".to_string(), "snow".to_string(), "winter".to_string()],
        }
    }

    async fn store_with_completed() -> (MediaStore, MediaId) {
        let store = MediaStore::new();
        let id = store
            .append(vec![MediaFile::new("fox.jpg", "image/jpeg", vec![1])])
            .await
            .remove(0);
        store.begin_processing(&id).await.unwrap();
        store.complete(&id, metadata()).await.unwrap();
        (store, id)
    }

    #[test]
    fn test_apply_title_affixes() {
        let mut metadata = Metadata {
            title: "Cat".to_string(),
            ..Metadata::default()
        };
        apply_title_affixes(&mut metadata, "A-", "-B");
        assert_eq!(metadata.title, "A-Cat-B");
    }

    #[test]
    fn test_copy_text_per_field() {
        let metadata = metadata();
        assert_eq!(CopyField::Title.text(&metadata), "Red fox");
        assert_eq!(CopyField::Keywords.text(&metadata), "fox, snow, winter");
        assert_eq!("description".parse::<CopyField>(), Ok(CopyField::Description));
        assert!("tags".parse::<CopyField>().is_err());
    }

    #[test]
    fn test_copied_indicator_expires_after_window() {
        let mut tracker = CopyTracker::default();
        let id = MediaId::from("fox.jpg-1");
        let start = Instant::now();

        tracker.mark_at(&id, CopyField::Title, start);
        assert_eq!(tracker.active_at(&id, start), Some(CopyField::Title));
        assert_eq!(
            tracker.active_at(&id, start + Duration::from_millis(1999)),
            Some(CopyField::Title)
        );
        assert_eq!(tracker.active_at(&id, start + COPIED_WINDOW), None);
    }

    #[test]
    fn test_newer_copy_replaces_older() {
        let mut tracker = CopyTracker::default();
        let id = MediaId::from("fox.jpg-1");
        let start = Instant::now();

        tracker.mark_at(&id, CopyField::Title, start);
        tracker.mark_at(&id, CopyField::Description, start + Duration::from_millis(500));
        assert_eq!(
            tracker.active_at(&id, start + Duration::from_millis(2100)),
            Some(CopyField::Description)
        );

        tracker.forget(&id);
        assert_eq!(tracker.active_at(&id, start), None);
    }

    #[tokio::test]
    async fn test_draft_commits_text_on_commit_only() {
        let (store, id) = store_with_completed().await;
        let mut draft = MetadataDraft::seed(&store.get(&id).await.unwrap());

        draft.title = "Arctic fox".to_string();
        assert_eq!(store.get(&id).await.unwrap().metadata.unwrap().title, "Red fox");

        draft.commit(&store).await.unwrap();
        let view = store.get(&id).await.unwrap();
        assert_eq!(view.metadata.unwrap().title, "Arctic fox");
        assert_eq!(draft.revision(), view.revision);
    }

    #[tokio::test]
    async fn test_draft_keyword_changes_commit_immediately() {
        let (store, id) = store_with_completed().await;
        let mut draft = MetadataDraft::seed(&store.get(&id).await.unwrap());
        draft.title = "Unsaved title".to_string();

        draft.remove_keyword(&store, 0).await.unwrap();
        draft.add_keyword(&store, "wildlife").await.unwrap();

        let stored = store.get(&id).await.unwrap().metadata.unwrap();
        assert_eq!(stored.keywords, ["snow", "winter", "wildlife"]);
        assert_eq!(draft.keywords(), stored.keywords.as_slice());
        assert_eq!(stored.title, "Red fox");
        assert_eq!(draft.title, "Unsaved title");
    }

    #[tokio::test]
    async fn test_draft_reseeds_when_revision_changes() {
        let (store, id) = store_with_completed().await;
        let mut draft = MetadataDraft::seed(&store.get(&id).await.unwrap());

        assert!(!draft.sync(&store.get(&id).await.unwrap()));

        store.rewrite_titles("Stock: ", "").await;
        assert!(draft.sync(&store.get(&id).await.unwrap()));
        assert_eq!(draft.title, "Stock: Red fox");
    }

    #[tokio::test]
    async fn test_draft_of_pending_item_is_empty_and_not_committable() {
        let store = MediaStore::new();
        let id = store
            .append(vec![MediaFile::new("p.jpg", "image/jpeg", vec![1])])
            .await
            .remove(0);
        let view = store.get(&id).await.unwrap();
        assert_eq!(view.status, MediaStatus::Pending);

        let mut draft = MetadataDraft::seed(&view);
        assert!(draft.title.is_empty());
        assert!(draft.keywords().is_empty());
        assert!(draft.commit(&store).await.is_err());
    }
}
