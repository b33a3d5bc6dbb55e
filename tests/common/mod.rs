//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use knowledge_extractor::config::{Config, LoaderConfig};
use knowledge_extractor::loader::DocumentSource;
use knowledge_extractor::model::ArtmConfig;
use knowledge_extractor::utils::error::FetchError;

/// Raw XML of a small court opinion with two paragraphs
pub fn opinion_xml(first: &str, second: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<n-document guid="test">
  <opinion.block>
    <para><paratext><bold>I.</bold> {first}</paratext></para>
    <para><paratext><starpage.anchor>12</starpage.anchor>
{second}
</paratext></para>
  </opinion.block>
</n-document>"#
    )
}

/// In-memory document source keyed by GUID
pub struct MemorySource {
    documents: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(documents: &[(&str, String)]) -> Self {
        Self {
            documents: documents
                .iter()
                .map(|(guid, xml)| (guid.to_string(), xml.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch_raw(&self, guid: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(guid)
            .cloned()
            .ok_or(FetchError::ServerError(404))
    }
}

/// Loader config pointing at `base_url` with fast retries
pub fn loader_config(base_url: &str, max_retries: u32) -> LoaderConfig {
    LoaderConfig {
        url_template: format!("{base_url}/rawxml/{{guid}}?websitehost=test"),
        request_timeout_secs: 5,
        max_retries,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 50,
        rate_limit: 100,
        max_concurrent_requests: 4,
    }
}

/// Small, fast topic model configuration
pub fn small_model_config() -> ArtmConfig {
    ArtmConfig {
        num_topics: 3,
        first_stage_passes: 5,
        second_stage_passes: 3,
        smooth_tau: 1.0,
        sparse_tau: -0.1,
        ..ArtmConfig::default()
    }
}

/// Service config storing everything under `root`
pub fn service_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.documents_dir = root.join("documents");
    config.storage.work_dir = root.join("bigARTM");
    config.model = small_model_config();
    config
}
