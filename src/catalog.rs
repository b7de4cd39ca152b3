use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use serde::Serialize;

use crate::parser::entry::Entry;

/// The published `projects.json`.
#[derive(Debug, Serialize)]
pub struct CatalogDocument {
    pub generated_at: String,
    pub total_count: usize,
    pub projects: Vec<Entry>,
}

impl CatalogDocument {
    /// Order entries by `number`, keeping processing order among equal numbers.
    pub fn build(mut entries: Vec<Entry>, generated_at: DateTime<FixedOffset>) -> Self {
        entries.sort_by_key(Entry::sort_number);
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            total_count: entries.len(),
            projects: entries,
        }
    }

    pub fn build_now(entries: Vec<Entry>) -> Self {
        Self::build(entries, Local::now().fixed_offset())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize catalog")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write catalog to {}", path.display()))
    }
}
