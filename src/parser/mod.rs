pub mod block;
pub mod entry;
pub mod sanitize;
pub mod structured;

use thiserror::Error;

use entry::{Entry, ProvenanceFields};
use sanitize::{Rejection, SafeRecord};

/// Why a README did not make it into the catalog.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("README not found")]
    NotFound,
    #[error("metadata block not found")]
    BlockNotFound,
    #[error("metadata parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

/// Locate → parse → sanitize.
pub fn extract_record(readme: &str) -> Result<SafeRecord, SkipReason> {
    let block = block::locate(readme).ok_or(SkipReason::BlockNotFound)?;
    let raw = structured::parse(block)?;
    Ok(sanitize::sanitize(raw)?)
}

pub fn process_document(
    readme: &str,
    repo: &str,
    provenance: &ProvenanceFields,
) -> Result<Entry, SkipReason> {
    let record = extract_record(readme)?;
    Ok(entry::assemble(record, repo, provenance))
}

// ── Tests ──
