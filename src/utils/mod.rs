//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Sanitize filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re = INVALID_CHARS
        .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("Invalid regex pattern"));

    re.replace_all(filename.trim(), "_").to_string()
}

/// Format a duration the way progress lines report it, e.g. `1m 02.345s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) as f64 / 1000.0;

    if minutes > 0 {
        format!("{minutes}m {seconds:06.3}s")
    } else {
        format!("{seconds:.3}s")
    }
}
