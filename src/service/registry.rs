//! Registry of topic models keyed by search GUID
//!
//! Each search has at most one model. Registration checks and inserts under a
//! single write lock, so concurrent first submissions start one training.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::model::{ModelState, TopicModel, TrainedModel};

// ============================================================================
// Model Record
// ============================================================================

/// Registry entry of one search
#[derive(Debug, Clone)]
pub struct ModelRecord {
    /// Model definition
    pub model: Arc<TopicModel>,

    /// Current state
    pub state: ModelState,

    /// Training output, once trained
    pub trained: Option<Arc<TrainedModel>>,

    /// Failure reason, once failed
    pub error: Option<String>,

    /// When the model was registered
    pub registered_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,
}

/// Outcome of [`ModelRegistry::register`]
#[derive(Debug, Clone)]
pub enum Registration {
    /// A new model was registered in `MODEL_TRAINING` and needs a training job
    Created(Arc<TopicModel>),

    /// The search already had a model
    Existing(ModelRecord),
}

// ============================================================================
// Model Registry
// ============================================================================

/// Process-wide table of topic models
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<HashMap<String, ModelRecord>>>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` unless its search already has one
    pub async fn register(&self, model: TopicModel) -> Registration {
        let mut models = self.models.write().await;

        if let Some(record) = models.get(model.search_guid()) {
            return Registration::Existing(record.clone());
        }

        let now = Utc::now();
        let model = Arc::new(model);
        models.insert(
            model.search_guid().to_string(),
            ModelRecord {
                model: model.clone(),
                state: ModelState::Training,
                trained: None,
                error: None,
                registered_at: now,
                updated_at: now,
            },
        );
        publish_counts(&models);

        Registration::Created(model)
    }

    /// State of a search's model; unknown searches are `MODEL_NOT_TRAINED`
    pub async fn state(&self, search_guid: &str) -> ModelState {
        self.models
            .read()
            .await
            .get(search_guid)
            .map_or(ModelState::NotTrained, |record| record.state)
    }

    /// Registry entry of a search
    pub async fn get(&self, search_guid: &str) -> Option<ModelRecord> {
        self.models.read().await.get(search_guid).cloned()
    }

    /// Training output of a search, if trained
    pub async fn trained(&self, search_guid: &str) -> Option<Arc<TrainedModel>> {
        self.models
            .read()
            .await
            .get(search_guid)
            .and_then(|record| record.trained.clone())
    }

    /// Mark a search as trained
    pub async fn complete(&self, search_guid: &str, trained: TrainedModel) {
        let mut models = self.models.write().await;
        if let Some(record) = models.get_mut(search_guid) {
            record.state = ModelState::Trained;
            record.trained = Some(Arc::new(trained));
            record.error = None;
            record.updated_at = Utc::now();
        }
        publish_counts(&models);
    }

    /// Mark a search as failed
    pub async fn fail(&self, search_guid: &str, error: impl Into<String>) {
        let mut models = self.models.write().await;
        if let Some(record) = models.get_mut(search_guid) {
            record.state = ModelState::Failed;
            record.error = Some(error.into());
            record.updated_at = Utc::now();
        }
        publish_counts(&models);
    }

    /// Number of registered searches
    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    /// Whether no search is registered
    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats::from_records(self.models.read().await.values())
    }
}

fn publish_counts(models: &HashMap<String, ModelRecord>) {
    let stats = RegistryStats::from_records(models.values());
    crate::metrics::update_model_counts(stats.training, stats.trained, stats.failed);
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total_models: usize,
    pub training: usize,
    pub trained: usize,
    pub failed: usize,
}

impl RegistryStats {
    fn from_records<'a>(records: impl Iterator<Item = &'a ModelRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_models += 1;
            match record.state {
                ModelState::Training => stats.training += 1,
                ModelState::Trained => stats.trained += 1,
                ModelState::Failed => stats.failed += 1,
                ModelState::NotTrained => {}
            }
        }
        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
