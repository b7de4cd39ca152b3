use std::path::Path;

use anyhow::{Context, Result};

/// Read the `owner/name` list, one per line. Blank lines and `#` comments are ignored.
pub fn read_source_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project list {}", path.display()))?;
    Ok(parse_source_list(&text))
}

pub fn parse_source_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
