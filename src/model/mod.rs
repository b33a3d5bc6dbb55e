//! Topic modelling over a search's documents
//!
//! A [`TopicModel`] is built per search GUID. Training writes the Vowpal
//! Wabbit collection for the stored documents, fits an [`ArtmModel`] in two
//! stages and projects every document onto the plane by its topic profile.

pub mod artm;
pub mod corpus;
pub mod mds;
pub mod profile;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::loader::DocumentStore;
use crate::text::prepare_text;
use crate::utils::error::ModelError;
use crate::utils::format_elapsed;

pub use artm::{ArtmConfig, ArtmModel, PhiRegularizer, BACKGROUND_TOPIC, SUBJECT_PREFIX};
pub use corpus::{vowpal_wabbit_line, vowpal_wabbit_token, Corpus, Modality};
pub use mds::Mds;

/// Training state of a search's model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelState {
    #[serde(rename = "MODEL_NOT_TRAINED")]
    NotTrained,
    #[serde(rename = "MODEL_TRAINING")]
    Training,
    #[serde(rename = "MODEL_TRAINED")]
    Trained,
    #[serde(rename = "MODEL_FAILED")]
    Failed,
}

impl ModelState {
    /// Wire name of the state
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotTrained => "MODEL_NOT_TRAINED",
            Self::Training => "MODEL_TRAINING",
            Self::Trained => "MODEL_TRAINED",
            Self::Failed => "MODEL_FAILED",
        }
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document projected onto the plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPoint {
    pub doc_guid: String,
    pub x: f64,
    pub y: f64,
    pub description: String,
}

/// Vowpal Wabbit collection written for one training
#[derive(Debug, Clone)]
pub struct Collection {
    /// File the collection was written to
    pub path: PathBuf,

    /// File content, one line per document
    pub content: String,

    /// GUIDs of the documents written, in line order
    pub doc_guids: Vec<String>,
}

/// Untrained model for one search
#[derive(Debug, Clone)]
pub struct TopicModel {
    search_guid: String,
    doc_guids: Vec<String>,
    config: ArtmConfig,
}

impl TopicModel {
    /// Create a model over `doc_guids`; duplicates keep their first position
    pub fn new(
        search_guid: impl Into<String>,
        doc_guids: impl IntoIterator<Item = String>,
        config: ArtmConfig,
    ) -> Self {
        let mut seen = HashSet::new();
        let doc_guids = doc_guids
            .into_iter()
            .filter(|guid| seen.insert(guid.clone()))
            .collect();

        Self {
            search_guid: search_guid.into(),
            doc_guids,
            config,
        }
    }

    /// Search GUID this model belongs to
    pub fn search_guid(&self) -> &str {
        &self.search_guid
    }

    /// Requested document GUIDs, in request order
    pub fn doc_guids(&self) -> &[String] {
        &self.doc_guids
    }

    /// Hyper-parameters used for training
    pub fn config(&self) -> &ArtmConfig {
        &self.config
    }

    /// Path of the Vowpal Wabbit collection inside `work_dir`
    pub fn collection_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!(
            "ALL_TEXT_{}.txt",
            crate::utils::sanitize_filename(&self.search_guid)
        ))
    }

    /// Write the collection of every stored document to `work_dir`
    ///
    /// Documents missing from the store are left out.
    pub fn write_collection(
        &self,
        store: &DocumentStore,
        work_dir: &Path,
    ) -> Result<Collection, ModelError> {
        let mut content = String::new();
        let mut doc_guids = Vec::new();
        let mut missing = 0usize;

        for guid in &self.doc_guids {
            if !store.contains(guid) {
                missing += 1;
                continue;
            }

            let text = store
                .load_lines(guid)?
                .iter()
                .map(|line| prepare_text(line))
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            content.push_str(&vowpal_wabbit_line(guid, &text));
            content.push('\n');
            doc_guids.push(guid.clone());
        }

        if missing > 0 {
            tracing::warn!(
                search_guid = %self.search_guid,
                missing,
                "Documents missing from the store were left out of the collection"
            );
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ModelError::Io { path, source }
        };

        fs::create_dir_all(work_dir).map_err(io_err(work_dir))?;
        let path = self.collection_path(work_dir);
        fs::write(&path, &content).map_err(io_err(&path))?;

        Ok(Collection {
            path,
            content,
            doc_guids,
        })
    }

    /// Train on the stored documents
    ///
    /// # Errors
    ///
    /// Returns `ModelError::EmptyCorpus` when no stored document has any text
    /// left after preparation.
    pub fn train(&self, store: &DocumentStore, work_dir: &Path) -> Result<TrainedModel, ModelError> {
        self.config.validate()?;
        let started = Instant::now();

        let collection = self.write_collection(store, work_dir)?;
        let corpus = Corpus::from_vowpal_wabbit(&collection.content)?;
        if corpus.is_empty() || corpus.vocabulary(Modality::Text).is_empty() {
            return Err(ModelError::EmptyCorpus(self.search_guid.clone()));
        }
        if corpus.len() != collection.doc_guids.len() {
            return Err(ModelError::Vowpal {
                line: corpus.len(),
                reason: format!(
                    "{} documents parsed from {} written",
                    corpus.len(),
                    collection.doc_guids.len()
                ),
            });
        }

        tracing::info!(
            search_guid = %self.search_guid,
            documents = corpus.len(),
            tokens = corpus.vocabulary(Modality::Text).len(),
            collection = %collection.path.display(),
            "Training topic model"
        );

        let mut model = ArtmModel::new(&corpus, &self.config);
        let background = model
            .topic_index(BACKGROUND_TOPIC)
            .ok_or_else(|| ModelError::InvalidConfig("missing background topic".to_string()))?;

        model.add_regularizer(PhiRegularizer {
            name: "SmoothSparsePhi_bcg".to_string(),
            tau: self.config.smooth_tau,
            modality: Modality::Text,
            topics: vec![background],
        });
        model.fit_offline(&corpus, self.config.first_stage_passes);

        model.add_regularizer(PhiRegularizer {
            name: "SmoothSparsePhi_sbj".to_string(),
            tau: self.config.sparse_tau,
            modality: Modality::Text,
            topics: model.subject_topics(),
        });
        model.fit_offline(&corpus, self.config.second_stage_passes);

        let points = self.project(&model, &corpus, &collection.doc_guids, store);
        let topics = model.top_tokens(&corpus, self.config.top_tokens);
        let perplexity = model.perplexity(&corpus);

        tracing::info!(
            search_guid = %self.search_guid,
            passes = model.passes_done(),
            perplexity,
            "Topic model trained in {}",
            format_elapsed(started.elapsed())
        );

        Ok(TrainedModel {
            search_guid: self.search_guid.clone(),
            points,
            topics,
            perplexity,
        })
    }

    fn project(
        &self,
        model: &ArtmModel,
        corpus: &Corpus,
        doc_guids: &[String],
        store: &DocumentStore,
    ) -> Vec<DocumentPoint> {
        let topics = model.topic_names().len();
        let p_t = profile::topic_probabilities(model.theta(), topics);

        let phi_doc = model.phi(Modality::DocGuid);
        let profiles: Vec<Vec<f64>> = corpus
            .documents()
            .iter()
            .map(|document| match document.entries(Modality::DocGuid).first() {
                Some(&(id, _)) => profile::topic_profile(&phi_doc[id], &p_t),
                None => vec![0.0; topics],
            })
            .collect();

        let distances = profile::cosine_distances(&profiles);
        let embedding = Mds::with_seed(self.config.seed).fit(&distances);
        tracing::debug!(stress = embedding.stress, "Document profiles embedded");

        doc_guids
            .iter()
            .zip(embedding.points)
            .map(|(guid, point)| {
                let description = store
                    .first_line(guid)
                    .unwrap_or_else(|e| {
                        tracing::warn!(guid = %guid, error = %e, "No description");
                        None
                    })
                    .unwrap_or_default();

                DocumentPoint {
                    doc_guid: guid.clone(),
                    x: point.first().copied().unwrap_or_default(),
                    y: point.get(1).copied().unwrap_or_default(),
                    description,
                }
            })
            .collect()
    }
}

/// Results of a finished training
#[derive(Debug, Clone)]
pub struct TrainedModel {
    search_guid: String,
    points: Vec<DocumentPoint>,
    topics: Vec<(String, Vec<(String, f64)>)>,
    perplexity: f64,
}

impl TrainedModel {
    /// Search GUID the model was trained for
    pub fn search_guid(&self) -> &str {
        &self.search_guid
    }

    /// Topic name to its top `count` words
    pub fn top_words(&self, count: usize) -> BTreeMap<String, Vec<String>> {
        self.topics
            .iter()
            .map(|(name, tokens)| {
                let words = tokens.iter().take(count).map(|(w, _)| w.clone()).collect();
                (name.clone(), words)
            })
            .collect()
    }

    /// Documents projected onto the plane, in request order
    pub fn topic_profile(&self) -> &[DocumentPoint] {
        &self.points
    }

    /// Final text perplexity
    pub fn perplexity(&self) -> f64 {
        self.perplexity
    }
}
