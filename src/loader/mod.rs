//! Raw document loading
//!
//! Fetches raw XML for a list of document GUIDs, extracts paragraph text and
//! stores it on disk. Documents already present in the store are skipped, and a
//! failure for one document never aborts the batch.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use knowledge_extractor::config::Config;
//! use knowledge_extractor::loader::{DocumentFetcher, DocumentLoader, DocumentStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let fetcher = DocumentFetcher::with_config(&config.loader)?;
//! let loader = DocumentLoader::new(
//!     Arc::new(fetcher),
//!     DocumentStore::new(&config.storage.documents_dir),
//!     config.loader.max_concurrent_requests,
//! );
//! let report = loader.load(&["I0f07d129334911d98b61a35269fc5f88".to_string()]).await;
//! println!("{} loaded", report.loaded.len());
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod fetcher;
pub mod guids;
pub mod store;

use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::utils::format_elapsed;

pub use extract::extract_paragraphs;
pub use fetcher::{DocumentFetcher, DocumentSource};
pub use guids::{parse_guid_line, read_guid_file};
pub use store::DocumentStore;

/// Outcome of loading one document
#[derive(Debug)]
enum LoadOutcome {
    Loaded,
    Skipped,
    Failed(Error),
}

/// Summary of a loader run
#[derive(Debug, Default)]
pub struct LoadReport {
    /// GUIDs fetched and stored during this run
    pub loaded: Vec<String>,

    /// GUIDs already present in the store
    pub skipped: Vec<String>,

    /// GUIDs that failed, with the error message
    pub failed: Vec<(String, String)>,

    /// Wall time of the whole run
    pub elapsed: Duration,
}

impl LoadReport {
    /// Number of GUIDs that are now available in the store
    pub fn available(&self) -> usize {
        self.loaded.len() + self.skipped.len()
    }
}

/// Fetch → extract → store pipeline
pub struct DocumentLoader {
    source: Arc<dyn DocumentSource>,
    store: DocumentStore,
    concurrency: usize,

    /// Per-GUID locks held while a document is fetched and stored
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentLoader {
    /// Create a loader reading from `source` into `store`
    pub fn new(source: Arc<dyn DocumentSource>, store: DocumentStore, concurrency: usize) -> Self {
        Self {
            source,
            store,
            concurrency: concurrency.max(1),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Store the loader writes into
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Load every GUID in `guids`, each at most once
    pub async fn load(&self, guids: &[String]) -> LoadReport {
        let started = Instant::now();

        let mut seen = HashSet::new();
        let unique: Vec<String> = guids
            .iter()
            .filter(|guid| seen.insert(guid.as_str()))
            .cloned()
            .collect();

        let outcomes: Vec<(String, LoadOutcome)> = stream::iter(unique)
            .map(|guid| async move {
                let outcome = self.load_one(&guid).await;
                (guid, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = LoadReport::default();
        for (guid, outcome) in outcomes {
            match outcome {
                LoadOutcome::Loaded => report.loaded.push(guid),
                LoadOutcome::Skipped => report.skipped.push(guid),
                LoadOutcome::Failed(e) => report.failed.push((guid, e.to_string())),
            }
        }
        report.elapsed = started.elapsed();

        crate::metrics::record_documents(
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len(),
        );

        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "{} documents loaded in {}",
            report.loaded.len(),
            format_elapsed(report.elapsed)
        );

        report
    }

    async fn load_one(&self, guid: &str) -> LoadOutcome {
        // Concurrent jobs sharing a GUID wait here, then find it stored
        let lock = self.guid_lock(guid);
        let _guard = lock.lock().await;
        let outcome = self.load_unlocked(guid).await;
        self.release_guid_lock(guid, &lock);
        outcome
    }

    fn guid_lock(&self, guid: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.entry(guid.to_string()).or_default().clone()
    }

    fn release_guid_lock(&self, guid: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Two references means nobody else is waiting on this GUID
        if Arc::strong_count(lock) <= 2 {
            in_flight.remove(guid);
        }
    }

    async fn load_unlocked(&self, guid: &str) -> LoadOutcome {
        if self.store.contains(guid) {
            tracing::info!(guid = %guid, "{guid} is already loaded");
            return LoadOutcome::Skipped;
        }

        let started = Instant::now();
        match self.fetch_and_store(guid).await {
            Ok(paragraphs) => {
                tracing::info!(
                    guid = %guid,
                    paragraphs = paragraphs,
                    "{guid} loading took {}",
                    format_elapsed(started.elapsed())
                );
                LoadOutcome::Loaded
            }
            Err(e) => {
                tracing::warn!(
                    guid = %guid,
                    category = e.category().label(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Failed to load document"
                );
                LoadOutcome::Failed(e)
            }
        }
    }

    async fn fetch_and_store(&self, guid: &str) -> Result<usize, Error> {
        let xml = self.source.fetch_raw(guid).await?;
        let paragraphs = extract_paragraphs(&xml)?;
        self.store.save(guid, &paragraphs)?;
        Ok(paragraphs.len())
    }
}
