use std::sync::LazyLock;

use regex::Regex;

/// `<!--` / `---` fence / content / `---` fence / `-->`, content may span lines.
static METADATA_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--\s*\n---\s*\n(.*?)\n---\s*\n-->").unwrap());

/// Find the first embedded metadata block and return its content verbatim.
pub fn locate(document: &str) -> Option<&str> {
    METADATA_BLOCK_RE
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
