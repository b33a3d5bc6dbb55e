//! Document GUID list parsing
//!
//! GUID files are comma separated, optionally quoted, spread over any number
//! of lines: `"I0f07d1...", "I1a2b3c..."`.

use std::fs;
use std::path::Path;

use crate::utils::error::StoreError;

/// Parse the GUIDs on one line of a GUID file
pub fn parse_guid_line(line: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }

    line.split(',')
        .map(|guid| guid.trim().replace('"', ""))
        .filter(|guid| !guid.is_empty())
        .collect()
}

/// Read every GUID listed in `path`, in file order
pub fn read_guid_file(path: &Path) -> Result<Vec<String>, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content.lines().flat_map(parse_guid_line).collect())
}
