//! Additive regularized topic model (ARTM)
//!
//! Offline EM over a multimodal [`Corpus`]:
//!
//! - E-step: for each document, `document_passes` inner iterations refine
//!   θ_d, then the expected counts n_wt are accumulated per modality.
//! - M-step: φ_wt ∝ max(n_wt + r_wt, 0) per modality and topic, where r_wt is
//!   the sum of the active Φ regularizers.
//!
//! The only regularizer is `SmoothSparsePhi`: r_wt = τ · p(w) for the selected
//! topics of one modality, with p(w) the collection frequency of the token.
//! Positive τ smooths, negative τ sparses. A column that the regularizers
//! drive entirely to zero falls back to its unregularized counts.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::corpus::{Corpus, Modality};
use crate::utils::error::ModelError;

/// Name of the background topic
pub const BACKGROUND_TOPIC: &str = "bcg";

/// Name prefix of subject topics
pub const SUBJECT_PREFIX: &str = "sbj";

/// Topic model hyper-parameters and training schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtmConfig {
    /// Number of topics, including the background topic
    pub num_topics: usize,

    /// Weight of the text modality
    pub text_weight: f64,

    /// Weight of the doc_guid modality
    pub doc_guid_weight: f64,

    /// Collection passes with background smoothing only
    pub first_stage_passes: usize,

    /// Collection passes after subject sparsing is added
    pub second_stage_passes: usize,

    /// Inner θ iterations per document and pass
    pub document_passes: usize,

    /// Smoothing coefficient on the background topic
    pub smooth_tau: f64,

    /// Sparsing coefficient on the subject topics
    pub sparse_tau: f64,

    /// Tokens kept per topic by the top-tokens score
    pub top_tokens: usize,

    /// Seed for Φ initialization and MDS
    pub seed: u64,
}

impl Default for ArtmConfig {
    fn default() -> Self {
        Self {
            num_topics: 10,
            text_weight: 1.0,
            doc_guid_weight: 1.0,
            first_stage_passes: 30,
            second_stage_passes: 15,
            document_passes: 10,
            smooth_tau: 1e5,
            sparse_tau: -1e5,
            top_tokens: 15,
            seed: 42,
        }
    }
}

impl ArtmConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_topics < 2 {
            return Err(ModelError::InvalidConfig(
                "num_topics must be at least 2 (one subject topic plus background)".to_string(),
            ));
        }

        if self.text_weight < 0.0 || self.doc_guid_weight < 0.0 {
            return Err(ModelError::InvalidConfig(
                "modality weights must not be negative".to_string(),
            ));
        }

        if self.document_passes == 0 {
            return Err(ModelError::InvalidConfig(
                "document_passes must be greater than 0".to_string(),
            ));
        }

        if self.top_tokens == 0 {
            return Err(ModelError::InvalidConfig(
                "top_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Topic names: `sbj0..sbj{T-2}` followed by `bcg`
    pub fn topic_names(&self) -> Vec<String> {
        (0..self.num_topics.saturating_sub(1))
            .map(|i| format!("{SUBJECT_PREFIX}{i}"))
            .chain(std::iter::once(BACKGROUND_TOPIC.to_string()))
            .collect()
    }
}

/// SmoothSparsePhi regularizer
#[derive(Debug, Clone)]
pub struct PhiRegularizer {
    /// Regularizer name, for logging
    pub name: String,

    /// Coefficient; positive smooths, negative sparses
    pub tau: f64,

    /// Modality the regularizer applies to
    pub modality: Modality,

    /// Topic indices the regularizer applies to
    pub topics: Vec<usize>,
}

/// Trained Φ and Θ matrices
pub struct ArtmModel {
    topic_names: Vec<String>,
    modality_weights: [f64; 2],
    document_passes: usize,

    /// φ[modality][token][topic]
    phi: [Vec<Vec<f64>>; 2],

    /// θ[document][topic]
    theta: Vec<Vec<f64>>,

    regularizers: Vec<PhiRegularizer>,
    passes_done: usize,

    /// Columns that fell back to unregularized counts in the last pass
    collapsed_columns: usize,
}

impl ArtmModel {
    /// Initialize Φ randomly and Θ uniformly for `corpus`
    pub fn new(corpus: &Corpus, config: &ArtmConfig) -> Self {
        let topic_names = config.topic_names();
        let topics = topic_names.len();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let phi = Modality::ALL.map(|modality| {
            let tokens = corpus.vocabulary(modality).len();
            let mut matrix: Vec<Vec<f64>> = (0..tokens)
                .map(|_| (0..topics).map(|_| rng.gen::<f64>()).collect())
                .collect();
            normalize_columns(&mut matrix, topics);
            matrix
        });

        let theta = vec![vec![1.0 / topics as f64; topics]; corpus.len()];

        Self {
            topic_names,
            modality_weights: [config.text_weight, config.doc_guid_weight],
            document_passes: config.document_passes,
            phi,
            theta,
            regularizers: Vec::new(),
            passes_done: 0,
            collapsed_columns: 0,
        }
    }

    /// Topic names in column order
    pub fn topic_names(&self) -> &[String] {
        &self.topic_names
    }

    /// Index of a topic by name
    pub fn topic_index(&self, name: &str) -> Option<usize> {
        self.topic_names.iter().position(|t| t == name)
    }

    /// Indices of all subject topics
    pub fn subject_topics(&self) -> Vec<usize> {
        self.topic_names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.starts_with(SUBJECT_PREFIX))
            .map(|(i, _)| i)
            .collect()
    }

    /// Add a Φ regularizer for subsequent passes
    pub fn add_regularizer(&mut self, regularizer: PhiRegularizer) {
        tracing::debug!(
            name = %regularizer.name,
            tau = regularizer.tau,
            modality = %regularizer.modality,
            topics = regularizer.topics.len(),
            "Adding Phi regularizer"
        );
        self.regularizers.push(regularizer);
    }

    /// Φ of one modality, `[token][topic]`
    pub fn phi(&self, modality: Modality) -> &[Vec<f64>] {
        &self.phi[modality.index()]
    }

    /// Θ, `[document][topic]`
    pub fn theta(&self) -> &[Vec<f64>] {
        &self.theta
    }

    /// Total collection passes performed
    pub fn passes_done(&self) -> usize {
        self.passes_done
    }

    /// Φ columns the regularizers zeroed out in the last pass
    pub fn collapsed_columns(&self) -> usize {
        self.collapsed_columns
    }

    /// Run `passes` offline EM passes over `corpus`
    pub fn fit_offline(&mut self, corpus: &Corpus, passes: usize) {
        for _ in 0..passes {
            let counts = self.e_step(corpus);
            self.m_step(corpus, counts);
            self.passes_done += 1;

            if self.passes_done % 10 == 0 {
                tracing::debug!(
                    pass = self.passes_done,
                    perplexity = self.perplexity(corpus),
                    "ARTM pass finished"
                );
            }
        }
    }

    fn e_step(&mut self, corpus: &Corpus) -> [Vec<Vec<f64>>; 2] {
        let topics = self.topic_names.len();
        let mut n_wt = Modality::ALL.map(|m| vec![vec![0.0; topics]; self.phi[m.index()].len()]);

        for (d, document) in corpus.documents().iter().enumerate() {
            let theta_d = &mut self.theta[d];

            for _ in 0..self.document_passes {
                let mut n_td = vec![0.0; topics];

                for modality in Modality::ALL {
                    let weight = self.modality_weights[modality.index()];
                    for &(w, n_dw) in document.entries(modality) {
                        let phi_w = &self.phi[modality.index()][w];
                        let z = dot(phi_w, theta_d);
                        if z <= 0.0 {
                            continue;
                        }
                        let scale = weight * n_dw / z;
                        for t in 0..topics {
                            n_td[t] += scale * phi_w[t] * theta_d[t];
                        }
                    }
                }

                let total: f64 = n_td.iter().sum();
                if total > 0.0 {
                    for t in 0..topics {
                        theta_d[t] = n_td[t] / total;
                    }
                }
            }

            for modality in Modality::ALL {
                let weight = self.modality_weights[modality.index()];
                for &(w, n_dw) in document.entries(modality) {
                    let phi_w = &self.phi[modality.index()][w];
                    let z = dot(phi_w, theta_d);
                    if z <= 0.0 {
                        continue;
                    }
                    let scale = weight * n_dw / z;
                    let counts = &mut n_wt[modality.index()][w];
                    for t in 0..topics {
                        counts[t] += scale * phi_w[t] * theta_d[t];
                    }
                }
            }
        }

        n_wt
    }

    fn m_step(&mut self, corpus: &Corpus, counts: [Vec<Vec<f64>>; 2]) {
        let topics = self.topic_names.len();
        let mut collapsed: Vec<String> = Vec::new();

        for modality in Modality::ALL {
            let vocabulary = corpus.vocabulary(modality);
            let n_wt = &counts[modality.index()];
            let phi = &mut self.phi[modality.index()];

            for t in 0..topics {
                let active: Vec<&PhiRegularizer> = self
                    .regularizers
                    .iter()
                    .filter(|r| r.modality == modality && r.topics.contains(&t))
                    .collect();

                let regularized: Vec<f64> = (0..n_wt.len())
                    .map(|w| {
                        let r_wt: f64 = active
                            .iter()
                            .map(|r| r.tau * vocabulary.frequency(w))
                            .sum();
                        (n_wt[w][t] + r_wt).max(0.0)
                    })
                    .collect();

                let mut column = regularized;
                let mut total: f64 = column.iter().sum();
                if total <= 0.0 && !active.is_empty() {
                    collapsed.push(format!("{}:{}", modality, self.topic_names[t]));
                    column = (0..n_wt.len()).map(|w| n_wt[w][t].max(0.0)).collect();
                    total = column.iter().sum();
                }

                for (w, value) in column.into_iter().enumerate() {
                    phi[w][t] = if total > 0.0 { value / total } else { 0.0 };
                }
            }
        }

        if !collapsed.is_empty() {
            tracing::debug!(
                pass = self.passes_done + 1,
                columns = ?collapsed,
                "Regularized Phi columns were empty, kept unregularized counts"
            );
        }
        self.collapsed_columns = collapsed.len();
    }

    /// Perplexity of the text modality under the current Φ and Θ
    pub fn perplexity(&self, corpus: &Corpus) -> f64 {
        let mut log_likelihood = 0.0;
        let mut tokens = 0.0;

        for (d, document) in corpus.documents().iter().enumerate() {
            for &(w, n_dw) in document.entries(Modality::Text) {
                let p = dot(&self.phi[Modality::Text.index()][w], &self.theta[d]);
                if p > 0.0 {
                    log_likelihood += n_dw * p.ln();
                }
                tokens += n_dw;
            }
        }

        if tokens > 0.0 {
            (-log_likelihood / tokens).exp()
        } else {
            f64::NAN
        }
    }

    /// Top text tokens of every topic, by descending φ
    pub fn top_tokens(&self, corpus: &Corpus, count: usize) -> Vec<(String, Vec<(String, f64)>)> {
        let vocabulary = corpus.vocabulary(Modality::Text);
        let phi = self.phi(Modality::Text);

        self.topic_names
            .iter()
            .enumerate()
            .map(|(t, name)| {
                let mut weighted: Vec<(usize, f64)> = phi
                    .iter()
                    .enumerate()
                    .map(|(w, row)| (w, row[t]))
                    .filter(|(_, weight)| *weight > 0.0)
                    .collect();
                weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

                let tokens = weighted
                    .into_iter()
                    .take(count)
                    .map(|(w, weight)| (vocabulary.token(w).to_string(), weight))
                    .collect();
                (name.clone(), tokens)
            })
            .collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize_columns(matrix: &mut [Vec<f64>], topics: usize) {
    for t in 0..topics {
        let total: f64 = matrix.iter().map(|row| row[t]).sum();
        if total > 0.0 {
            for row in matrix.iter_mut() {
                row[t] /= total;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus {
        Corpus::from_vowpal_wabbit(
            "document_a |text court judg appeal court judg appeal law |doc_guid a\n\
             document_b |text court appeal judg court judg law |doc_guid b\n\
             document_c |text contract breach damag contract breach law |doc_guid c\n\
             document_d |text breach contract damag damag contract law |doc_guid d\n",
        )
        .unwrap()
    }

    fn config(num_topics: usize) -> ArtmConfig {
        ArtmConfig {
            num_topics,
            first_stage_passes: 20,
            second_stage_passes: 0,
            smooth_tau: 0.0,
            sparse_tau: 0.0,
            ..ArtmConfig::default()
        }
    }

    fn assert_stochastic(phi: &[Vec<f64>], topics: usize) {
        for t in 0..topics {
            let total: f64 = phi.iter().map(|row| row[t]).sum();
            assert!(
                (total - 1.0).abs() < 1e-9 || total == 0.0,
                "column {t} sums to {total}"
            );
        }
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(config(3).topic_names(), vec!["sbj0", "sbj1", "bcg"]);
        assert_eq!(ArtmConfig::default().topic_names().len(), 10);
    }

    #[test]
    fn test_validate() {
        assert!(ArtmConfig::default().validate().is_ok());
        assert!(config(1).validate().is_err());

        let bad = ArtmConfig {
            top_tokens: 0,
            ..ArtmConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_fit_keeps_distributions_normalized() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        model.fit_offline(&corpus, 10);

        assert_eq!(model.passes_done(), 10);
        assert_stochastic(model.phi(Modality::Text), 3);
        assert_stochastic(model.phi(Modality::DocGuid), 3);
        for theta_d in model.theta() {
            let total: f64 = theta_d.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_training_reduces_perplexity() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        let before = model.perplexity(&corpus);
        model.fit_offline(&corpus, 20);
        let after = model.perplexity(&corpus);

        assert!(after < before, "perplexity {before} -> {after}");
    }

    #[test]
    fn test_training_is_deterministic() {
        let corpus = corpus();
        let mut first = ArtmModel::new(&corpus, &config(3));
        let mut second = ArtmModel::new(&corpus, &config(3));
        first.fit_offline(&corpus, 5);
        second.fit_offline(&corpus, 5);

        assert_eq!(first.theta(), second.theta());
    }

    #[test]
    fn test_smoothing_pulls_background_towards_collection() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        let bcg = model.topic_index(BACKGROUND_TOPIC).unwrap();
        model.add_regularizer(PhiRegularizer {
            name: "SmoothPhi".to_string(),
            tau: 1e6,
            modality: Modality::Text,
            topics: vec![bcg],
        });
        model.fit_offline(&corpus, 5);

        let vocabulary = corpus.vocabulary(Modality::Text);
        let law = vocabulary.id("law").unwrap();
        let phi = model.phi(Modality::Text);
        assert!((phi[law][bcg] - vocabulary.frequency(law)).abs() < 1e-3);
    }

    #[test]
    fn test_sparsing_zeroes_rare_tokens() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        model.fit_offline(&corpus, 10);
        let subjects = model.subject_topics();
        assert_eq!(subjects, vec![0, 1]);

        model.add_regularizer(PhiRegularizer {
            name: "SparsePhi".to_string(),
            tau: -1.0,
            modality: Modality::Text,
            topics: subjects.clone(),
        });
        model.fit_offline(&corpus, 5);

        let phi = model.phi(Modality::Text);
        let zeros = phi
            .iter()
            .flat_map(|row| subjects.iter().map(move |&t| row[t]))
            .filter(|&p| p == 0.0)
            .count();
        assert!(zeros > 0);
        assert_stochastic(phi, 3);
    }

    #[test]
    fn test_overwhelming_sparsing_falls_back() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        model.add_regularizer(PhiRegularizer {
            name: "SparsePhi".to_string(),
            tau: -1e9,
            modality: Modality::Text,
            topics: model.subject_topics(),
        });
        model.fit_offline(&corpus, 3);

        assert_eq!(model.collapsed_columns(), 2);
        for (_, tokens) in model.top_tokens(&corpus, 15) {
            assert!(!tokens.is_empty());
        }
    }

    #[test]
    fn test_mild_sparsing_keeps_columns() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        model.fit_offline(&corpus, 5);
        assert_eq!(model.collapsed_columns(), 0);

        model.add_regularizer(PhiRegularizer {
            name: "SparsePhi".to_string(),
            tau: -0.01,
            modality: Modality::Text,
            topics: model.subject_topics(),
        });
        model.fit_offline(&corpus, 3);
        assert_eq!(model.collapsed_columns(), 0);
    }

    #[test]
    fn test_top_tokens_sorted_and_limited() {
        let corpus = corpus();
        let mut model = ArtmModel::new(&corpus, &config(3));
        model.fit_offline(&corpus, 10);

        let top = model.top_tokens(&corpus, 2);
        assert_eq!(top.len(), 3);
        for (_, tokens) in &top {
            assert!(tokens.len() <= 2);
            if tokens.len() == 2 {
                assert!(tokens[0].1 >= tokens[1].1);
            }
        }
    }
}
