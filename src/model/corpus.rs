//! Bag-of-words corpus with two modalities
//!
//! Every document carries its prepared text tokens and a single `doc_guid`
//! token naming the document itself. The corpus round-trips through the
//! Vowpal Wabbit text format:
//!
//! ```text
//! document_I0f07d1 |text court judg court:2 |doc_guid I0f07d1
//! ```
//!
//! GUIDs are percent-encoded on the way out, so `:`, `|` and whitespace in a
//! GUID cannot be mistaken for format separators.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::utils::error::ModelError;

/// Prefix of the document name in Vowpal Wabbit lines
pub const DOCUMENT_PREFIX: &str = "document_";

/// Token class of a corpus entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Prepared paragraph tokens
    Text,
    /// The document's own GUID
    DocGuid,
}

impl Modality {
    /// All modalities, in storage order
    pub const ALL: [Modality; 2] = [Modality::Text, Modality::DocGuid];

    /// Storage index
    pub fn index(self) -> usize {
        match self {
            Self::Text => 0,
            Self::DocGuid => 1,
        }
    }

    /// Class name used in Vowpal Wabbit files
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::DocGuid => "doc_guid",
        }
    }

    /// Parse a class name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "doc_guid" => Some(Self::DocGuid),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Token dictionary of one modality
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
    counts: Vec<f64>,
    total: f64,
}

impl Vocabulary {
    fn add(&mut self, token: &str, count: f64) -> usize {
        let id = match self.index.get(token) {
            Some(&id) => id,
            None => {
                let id = self.tokens.len();
                self.tokens.push(token.to_string());
                self.index.insert(token.to_string(), id);
                self.counts.push(0.0);
                id
            }
        };
        self.counts[id] += count;
        self.total += count;
        id
    }

    /// Number of distinct tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token text by id
    pub fn token(&self, id: usize) -> &str {
        &self.tokens[id]
    }

    /// Token id by text
    pub fn id(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    /// Collection frequency p(w) of a token within its modality
    pub fn frequency(&self, id: usize) -> f64 {
        if self.total > 0.0 {
            self.counts[id] / self.total
        } else {
            0.0
        }
    }

    /// Total token count in the modality
    pub fn total(&self) -> f64 {
        self.total
    }
}

/// One document as sparse token counts per modality
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    /// Document name, `document_<guid>`
    pub name: String,

    /// `doc_guid` token as written in the collection
    pub guid: String,

    /// `(token id, count)` pairs, one list per modality
    pub entries: [Vec<(usize, f64)>; 2],
}

impl CorpusDocument {
    /// Entries of one modality
    pub fn entries(&self, modality: Modality) -> &[(usize, f64)] {
        &self.entries[modality.index()]
    }
}

/// Document collection
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<CorpusDocument>,
    vocabularies: [Vocabulary; 2],
}

impl Corpus {
    /// Parse a Vowpal Wabbit collection
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Vowpal` for lines with an unknown modality or a
    /// malformed token count.
    pub fn from_vowpal_wabbit(input: &str) -> Result<Self, ModelError> {
        let mut corpus = Self::default();

        for (line_no, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            corpus.push_line(line_no + 1, line)?;
        }

        Ok(corpus)
    }

    fn push_line(&mut self, line_no: usize, line: &str) -> Result<(), ModelError> {
        let mut sections = line.split('|');
        let name = sections.next().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(ModelError::Vowpal {
                line: line_no,
                reason: "missing document name".to_string(),
            });
        }

        let mut counts: [HashMap<usize, f64>; 2] = [HashMap::new(), HashMap::new()];
        let mut order: [Vec<usize>; 2] = [Vec::new(), Vec::new()];

        for section in sections {
            let mut words = section.split_whitespace();
            let Some(class) = words.next() else {
                continue;
            };
            let modality = Modality::from_name(class).ok_or_else(|| ModelError::Vowpal {
                line: line_no,
                reason: format!("unknown modality '{class}'"),
            })?;

            for word in words {
                let (token, count) = parse_token(word).map_err(|reason| ModelError::Vowpal {
                    line: line_no,
                    reason,
                })?;
                let id = self.vocabularies[modality.index()].add(token, count);
                let slot = &mut counts[modality.index()];
                if !slot.contains_key(&id) {
                    order[modality.index()].push(id);
                }
                *slot.entry(id).or_insert(0.0) += count;
            }
        }

        let guid = order[Modality::DocGuid.index()]
            .first()
            .map(|&id| self.vocabularies[Modality::DocGuid.index()].token(id).to_string())
            .unwrap_or_else(|| name.trim_start_matches(DOCUMENT_PREFIX).to_string());

        let entries = [0, 1].map(|m| order[m].iter().map(|id| (*id, counts[m][id])).collect());

        self.documents.push(CorpusDocument {
            name,
            guid,
            entries,
        });
        Ok(())
    }

    /// Documents in file order
    pub fn documents(&self) -> &[CorpusDocument] {
        &self.documents
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus has no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Vocabulary of one modality
    pub fn vocabulary(&self, modality: Modality) -> &Vocabulary {
        &self.vocabularies[modality.index()]
    }
}

fn parse_token(word: &str) -> Result<(&str, f64), String> {
    match word.rsplit_once(':') {
        Some((token, count)) if !token.is_empty() => {
            let count: f64 = count
                .parse()
                .map_err(|_| format!("invalid count in '{word}'"))?;
            if !count.is_finite() || count < 0.0 {
                return Err(format!("invalid count in '{word}'"));
            }
            Ok((token, count))
        }
        _ => Ok((word, 1.0)),
    }
}

/// Encode a GUID as a single Vowpal Wabbit token
pub fn vowpal_wabbit_token(guid: &str) -> Cow<'_, str> {
    urlencoding::encode(guid)
}

/// Format one document as a Vowpal Wabbit line
pub fn vowpal_wabbit_line(guid: &str, text_tokens: &str) -> String {
    let guid = vowpal_wabbit_token(guid);
    format!(
        "{DOCUMENT_PREFIX}{guid} |{} {} |{} {guid}",
        Modality::Text.name(),
        text_tokens.trim(),
        Modality::DocGuid.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection() {
        let input = "document_a |text court judg court |doc_guid a\n\
                     document_b |text contract:3 |doc_guid b\n";
        let corpus = Corpus::from_vowpal_wabbit(input).unwrap();

        assert_eq!(corpus.len(), 2);
        let text = corpus.vocabulary(Modality::Text);
        assert_eq!(text.len(), 3);
        assert_eq!(text.total(), 6.0);
        assert_eq!(text.frequency(text.id("contract").unwrap()), 0.5);

        let a = &corpus.documents()[0];
        assert_eq!(a.guid, "a");
        assert_eq!(a.entries(Modality::Text), &[(0, 2.0), (1, 1.0)]);
        assert_eq!(a.entries(Modality::DocGuid).len(), 1);
    }

    #[test]
    fn test_line_round_trip() {
        let line = vowpal_wabbit_line("g1", "word other word");
        assert_eq!(line, "document_g1 |text word other word |doc_guid g1");

        let corpus = Corpus::from_vowpal_wabbit(&line).unwrap();
        assert_eq!(corpus.documents()[0].guid, "g1");
        assert_eq!(corpus.documents()[0].entries(Modality::Text), &[(0, 2.0), (1, 1.0)]);
    }

    #[test]
    fn test_separators_in_guid_are_encoded() {
        let input = [
            vowpal_wabbit_line("doc:1", "court"),
            vowpal_wabbit_line("a|b", "court"),
            vowpal_wabbit_line("two words", "court"),
            vowpal_wabbit_line("doc%3A1", "court"),
        ]
        .join("\n");
        assert!(input.starts_with("document_doc%3A1 |text court |doc_guid doc%3A1\n"));

        let corpus = Corpus::from_vowpal_wabbit(&input).unwrap();
        let guids: Vec<&str> = corpus.documents().iter().map(|d| d.guid.as_str()).collect();
        assert_eq!(guids, vec!["doc%3A1", "a%7Cb", "two%20words", "doc%253A1"]);
        assert_eq!(corpus.vocabulary(Modality::DocGuid).len(), 4);
        assert!(corpus
            .documents()
            .iter()
            .all(|d| d.entries(Modality::DocGuid).len() == 1));
    }

    #[test]
    fn test_document_without_text() {
        let line = vowpal_wabbit_line("g1", "");
        let corpus = Corpus::from_vowpal_wabbit(&line).unwrap();
        assert!(corpus.documents()[0].entries(Modality::Text).is_empty());
        assert!(corpus.vocabulary(Modality::Text).is_empty());
    }

    #[test]
    fn test_guid_falls_back_to_name() {
        let corpus = Corpus::from_vowpal_wabbit("document_xyz |text a b").unwrap();
        assert_eq!(corpus.documents()[0].guid, "xyz");
    }

    #[test]
    fn test_unknown_modality() {
        let result = Corpus::from_vowpal_wabbit("document_a |author smith");
        assert!(matches!(result, Err(ModelError::Vowpal { line: 1, .. })));
    }

    #[test]
    fn test_bad_count() {
        let result = Corpus::from_vowpal_wabbit("document_a |text word:x");
        assert!(matches!(result, Err(ModelError::Vowpal { .. })));
    }
}
