//! Text preparation for topic modelling
//!
//! Turns a paragraph into a space separated list of normalized tokens:
//! lowercase, punctuation stripped, English stopwords removed and every
//! remaining token reduced to its Snowball stem.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::LazyLock;

static REPLACE_BY_SPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/(){}\[\]\|@,;]").unwrap());

static BAD_SYMBOLS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9a-z #+_]").unwrap());

static STOPWORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    stop_words::get(stop_words::LANGUAGE::English)
        .into_iter()
        .map(|word| word.to_string())
        .collect()
});

static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Normalize one line of document text into model tokens
///
/// # Examples
///
/// ```
/// use knowledge_extractor::text::prepare_text;
///
/// assert_eq!(prepare_text("The Courts, (and) the JUDGES!"), "court judg");
/// ```
pub fn prepare_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = REPLACE_BY_SPACE_REGEX.replace_all(&lowered, " ");
    let cleaned = BAD_SYMBOLS_REGEX.replace_all(&spaced, "");

    cleaned
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .map(|token| STEMMER.stem(token).into_owned())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `token` is an English stopword
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}
