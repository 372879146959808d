//! Sequential generation runs
//!
//! A run takes the ids pending when it starts and processes them one at a
//! time. Only one run may be active; the flag is held by a `RunGuard` for
//! the lifetime of the run.

use common::{GenerationSettings, MediaId, MediaStore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::MetadataGenerator;
use crate::encoding::EncodedMedia;
use crate::error::OrchestratorError;

/// Counts for one finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Items deleted or otherwise moved before they could be processed
    pub skipped: usize,
}

enum Outcome {
    Completed,
    Failed,
    Skipped,
}

/// A run started in the background
pub struct RunHandle {
    /// Items queued when the run started
    pub queued: usize,
    pub handle: JoinHandle<RunSummary>,
}

/// Clears the generating flag when the run ends
pub struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives pending items through generation, one at a time
#[derive(Clone)]
pub struct Orchestrator {
    store: MediaStore,
    generator: Arc<dyn MetadataGenerator>,
    generating: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(store: MediaStore, generator: Arc<dyn MetadataGenerator>) -> Self {
        Self {
            store,
            generator,
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<RunGuard, OrchestratorError> {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrchestratorError::AlreadyRunning)?;

        Ok(RunGuard {
            flag: Arc::clone(&self.generating),
        })
    }

    /// Process every currently pending item and wait for the run to finish
    pub async fn run(&self, settings: GenerationSettings) -> Result<RunSummary, OrchestratorError> {
        settings.validate()?;
        let guard = self.acquire()?;
        let queue = self.store.pending_ids().await.into();
        Ok(self.process_queue(queue, &settings, guard).await)
    }

    /// Start a run in the background
    ///
    /// The generating flag and the queue are both taken before this returns,
    /// so a second call fails with `AlreadyRunning` and `queued` is exactly
    /// what the run will process.
    pub async fn spawn(&self, settings: GenerationSettings) -> Result<RunHandle, OrchestratorError> {
        settings.validate()?;
        let guard = self.acquire()?;
        let queue: VecDeque<MediaId> = self.store.pending_ids().await.into();
        let queued = queue.len();
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            orchestrator.process_queue(queue, &settings, guard).await
        });

        Ok(RunHandle { queued, handle })
    }

    async fn process_queue(
        &self,
        mut queue: VecDeque<MediaId>,
        settings: &GenerationSettings,
        _guard: RunGuard,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        info!(
            "Processing {} pending items with {}",
            queue.len(),
            self.generator.model_name()
        );

        while let Some(id) = queue.pop_front() {
            match self.process_one(&id, settings).await {
                Outcome::Completed => summary.completed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }

        info!(
            "Generation finished: {} completed, {} failed, {} skipped",
            summary.completed, summary.failed, summary.skipped
        );
        summary
    }

    async fn process_one(&self, id: &MediaId, settings: &GenerationSettings) -> Outcome {
        let file = match self.store.begin_processing(id).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping media item {}: {}", id, e);
                return Outcome::Skipped;
            }
        };

        info!("Generating metadata for {}", id);
        let media = EncodedMedia::encode(&file);

        match self.generator.generate(&media, settings).await {
            Ok(metadata) => match self.store.complete(id, metadata).await {
                Ok(()) => {
                    info!("Successfully generated metadata for {}", id);
                    Outcome::Completed
                }
                Err(e) => {
                    warn!("Discarding metadata for {}: {}", id, e);
                    Outcome::Skipped
                }
            },
            Err(generation_error) => {
                error!("Failed to generate metadata for {}: {}", id, generation_error);
                match self.store.fail(id, generation_error.to_string()).await {
                    Ok(()) => Outcome::Failed,
                    Err(e) => {
                        warn!("Discarding error for {}: {}", id, e);
                        Outcome::Skipped
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use common::{MediaFile, MediaStatus, Metadata};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(String),
        End(String),
    }

    /// Echoes the decoded payload as the title; payloads starting with
    /// "fail" produce an error
    #[derive(Default)]
    struct ScriptedGenerator {
        events: Mutex<Vec<Event>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl MetadataGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            media: &EncodedMedia,
            settings: &GenerationSettings,
        ) -> Result<Metadata, GenerationError> {
            let payload = String::from_utf8(STANDARD.decode(&media.data).unwrap()).unwrap();
            self.events.lock().unwrap().push(Event::Start(payload.clone()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::End(payload.clone()));

            if payload.starts_with("fail") {
                return Err(GenerationError::Generation("quota exceeded".to_string()));
            }
            Ok(Metadata {
                title: payload,
                description: format!("{} keywords requested", settings.keyword_count),
                keywords: vec!["k".to_string()],
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    /// Blocks inside `generate` until released
    #[derive(Default)]
    struct GatedGenerator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MetadataGenerator for GatedGenerator {
        async fn generate(
            &self,
            _media: &EncodedMedia,
            _settings: &GenerationSettings,
        ) -> Result<Metadata, GenerationError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Metadata::default())
        }

        fn model_name(&self) -> &str {
            "gated"
        }
    }

    fn file(payload: &str) -> MediaFile {
        MediaFile::new(format!("{}.jpg", payload), "image/jpeg", payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_processes_each_pending_item_once_in_order() {
        let store = MediaStore::new();
        store.append(vec![file("one"), file("two"), file("three")]).await;
        let generator = Arc::new(ScriptedGenerator::default());
        let orchestrator = Orchestrator::new(store.clone(), generator.clone());

        let summary = orchestrator.run(GenerationSettings::default()).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                completed: 3,
                failed: 0,
                skipped: 0
            }
        );

        let events = generator.events.lock().unwrap().clone();
        let expected: Vec<Event> = ["one", "two", "three"]
            .iter()
            .flat_map(|p| [Event::Start(p.to_string()), Event::End(p.to_string())])
            .collect();
        assert_eq!(events, expected);
        assert_eq!(generator.max_in_flight.load(Ordering::SeqCst), 1);

        let titles: Vec<_> = store
            .snapshot()
            .await
            .into_iter()
            .map(|v| v.metadata.unwrap().title)
            .collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_failure_is_local_to_the_item() {
        let store = MediaStore::new();
        let ids = store.append(vec![file("ok-1"), file("fail-2"), file("ok-3")]).await;
        let orchestrator = Orchestrator::new(store.clone(), Arc::new(ScriptedGenerator::default()));

        let summary = orchestrator.run(GenerationSettings::default()).await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);

        let failed = store.get(&ids[1]).await.unwrap();
        assert_eq!(failed.status, MediaStatus::Error);
        assert_eq!(
            failed.error.as_deref(),
            Some("Failed to generate metadata: quota exceeded")
        );
        assert!(failed.metadata.is_none());
        assert_eq!(store.get(&ids[2]).await.unwrap().status, MediaStatus::Completed);
    }

    #[tokio::test]
    async fn test_only_pending_items_are_processed() {
        let store = MediaStore::new();
        store.append(vec![file("first")]).await;
        let generator = Arc::new(ScriptedGenerator::default());
        let orchestrator = Orchestrator::new(store.clone(), generator.clone());

        orchestrator.run(GenerationSettings::default()).await.unwrap();
        store.append(vec![file("second")]).await;
        let summary = orchestrator.run(GenerationSettings::default()).await.unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(generator.events.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_calls() {
        let store = MediaStore::new();
        let generator = Arc::new(ScriptedGenerator::default());
        let orchestrator = Orchestrator::new(store, generator.clone());

        let summary = orchestrator.run(GenerationSettings::default()).await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(generator.events.lock().unwrap().is_empty());
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_reentry_rejected_while_running() {
        let store = MediaStore::new();
        let ids = store.append(vec![file("slow")]).await;
        let generator = Arc::new(GatedGenerator::default());
        let orchestrator = Orchestrator::new(store.clone(), generator.clone());

        let run = orchestrator.spawn(GenerationSettings::default()).await.unwrap();
        assert_eq!(run.queued, 1);
        generator.entered.notified().await;

        assert!(orchestrator.is_generating());
        assert!(matches!(
            orchestrator.run(GenerationSettings::default()).await,
            Err(OrchestratorError::AlreadyRunning)
        ));
        assert!(matches!(
            orchestrator.spawn(GenerationSettings::default()).await,
            Err(OrchestratorError::AlreadyRunning)
        ));
        assert_eq!(store.get(&ids[0]).await.unwrap().status, MediaStatus::Processing);

        generator.release.notify_one();
        let summary = run.handle.await.unwrap();
        assert_eq!(summary.completed, 1);
        assert!(!orchestrator.is_generating());
    }

    #[tokio::test]
    async fn test_item_deleted_mid_generation_is_skipped() {
        let store = MediaStore::new();
        let ids = store.append(vec![file("gone")]).await;
        let generator = Arc::new(GatedGenerator::default());
        let orchestrator = Orchestrator::new(store.clone(), generator.clone());

        let run = orchestrator.spawn(GenerationSettings::default()).await.unwrap();
        generator.entered.notified().await;
        store.delete(&ids[0]).await.unwrap();
        generator.release.notify_one();

        let summary = run.handle.await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_spawn_queue_is_fixed_at_start() {
        let store = MediaStore::new();
        store.append(vec![file("early-1"), file("early-2")]).await;
        let generator = Arc::new(GatedGenerator::default());
        let orchestrator = Orchestrator::new(store.clone(), generator.clone());

        let run = orchestrator.spawn(GenerationSettings::default()).await.unwrap();
        assert_eq!(run.queued, 2);

        generator.entered.notified().await;
        let late = store.append(vec![file("late")]).await;
        generator.release.notify_one();
        generator.entered.notified().await;
        generator.release.notify_one();

        let summary = run.handle.await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(store.get(&late[0]).await.unwrap().status, MediaStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_before_start() {
        let orchestrator = Orchestrator::new(MediaStore::new(), Arc::new(ScriptedGenerator::default()));
        let settings = GenerationSettings {
            keyword_count: 0,
            ..GenerationSettings::default()
        };

        assert!(matches!(
            orchestrator.run(settings).await,
            Err(OrchestratorError::InvalidSettings(_))
        ));
        assert!(!orchestrator.is_generating());
    }
}
