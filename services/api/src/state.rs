//! Application state shared across handlers

use common::config::AppConfig;
use common::editor::CopyTracker;
use common::intake::IntakePolicy;
use common::{GenerationSettings, MediaStore, SettingsError};
use generator::{MetadataGenerator, Orchestrator};
use std::sync::{Arc, Mutex};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: MediaStore,
    pub orchestrator: Orchestrator,
    pub intake_policy: Arc<IntakePolicy>,
    pub copies: Arc<Mutex<CopyTracker>>,
    /// Settings used when a generate request carries none
    pub default_settings: GenerationSettings,
    pub max_request_bytes: usize,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        generator: Arc<dyn MetadataGenerator>,
    ) -> Result<Self, SettingsError> {
        let store = MediaStore::new();
        let orchestrator = Orchestrator::new(store.clone(), generator);
        let intake_policy = IntakePolicy::new(config.intake.clone())?;

        Ok(Self {
            store,
            orchestrator,
            intake_policy: Arc::new(intake_policy),
            copies: Arc::new(Mutex::new(CopyTracker::default())),
            default_settings: config.generation.clone(),
            max_request_bytes: config.server.max_request_bytes,
        })
    }
}
