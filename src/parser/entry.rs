use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::sanitize::{SafeRecord, NUMBER_FALLBACK};

/// Repository attributes fetched from GitHub, never from the README itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProvenanceFields {
    #[serde(rename = "stargazers_count")]
    pub stars: Option<i64>,
    #[serde(rename = "forks_count")]
    pub forks: Option<i64>,
    pub updated_at: Option<String>,
    pub language: Option<String>,
}

/// One catalog entry: sanitized metadata plus provenance, flattened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Entry(Map<String, Value>);

/// Merge metadata with provenance. Provenance keys are written last so the
/// README cannot spoof them.
pub fn assemble(record: SafeRecord, repo: &str, provenance: &ProvenanceFields) -> Entry {
    let mut fields = record.into_fields();
    fields.insert("repo".into(), Value::from(repo));
    fields.insert("stars".into(), Value::from(provenance.stars.unwrap_or(0)));
    fields.insert("forks".into(), Value::from(provenance.forks.unwrap_or(0)));
    fields.insert(
        "updated_at".into(),
        Value::from(provenance.updated_at.clone().unwrap_or_default()),
    );
    fields.insert(
        "language".into(),
        Value::from(provenance.language.clone().unwrap_or_default()),
    );
    Entry(fields)
}

impl Entry {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn repo(&self) -> &str {
        self.get("repo").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    /// Catalog ordering key. A missing `number` sorts with the fallback.
    pub fn sort_number(&self) -> i64 {
        self.get("number")
            .and_then(Value::as_i64)
            .unwrap_or(NUMBER_FALLBACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sanitize::sanitize;
    use serde_json::json;

    fn record(raw: Value) -> SafeRecord {
        sanitize(raw).unwrap()
    }

    #[test]
    fn missing_provenance_defaults_to_zero_and_empty() {
        let entry = assemble(record(json!({"title": "A", "number": 3})), "me/a", &ProvenanceFields::default());
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "title": "A",
                "number": 3,
                "repo": "me/a",
                "stars": 0,
                "forks": 0,
                "updated_at": "",
                "language": "",
            })
        );
    }

    #[test]
    fn provenance_overrides_document_fields() {
        let spoofed = record(json!({
            "title": "A",
            "repo": "someone/else",
            "stars": 100000,
            "forks": "lots",
            "updated_at": "2099-01-01",
            "language": "COBOL",
        }));
        let provenance = ProvenanceFields {
            stars: Some(12),
            forks: Some(3),
            updated_at: Some("2024-05-01T10:00:00Z".into()),
            language: Some("Rust".into()),
        };
        let entry = assemble(spoofed, "me/a", &provenance);
        assert_eq!(entry.repo(), "me/a");
        assert_eq!(entry.get("stars"), Some(&json!(12)));
        assert_eq!(entry.get("forks"), Some(&json!(3)));
        assert_eq!(entry.get("updated_at"), Some(&json!("2024-05-01T10:00:00Z")));
        assert_eq!(entry.get("language"), Some(&json!("Rust")));
    }

    #[test]
    fn spoofed_provenance_is_replaced_even_without_provenance() {
        let entry = assemble(
            record(json!({"title": "A", "stars": 5000, "repo": "x/y"})),
            "me/a",
            &ProvenanceFields::default(),
        );
        assert_eq!(entry.repo(), "me/a");
        assert_eq!(entry.get("stars"), Some(&json!(0)));
    }

    #[test]
    fn provenance_from_github_payload() {
        let payload = json!({
            "full_name": "me/a",
            "stargazers_count": 7,
            "forks_count": 1,
            "updated_at": "2024-01-02T03:04:05Z",
            "language": null,
        });
        let provenance: ProvenanceFields = serde_json::from_value(payload).unwrap();
        assert_eq!(provenance.stars, Some(7));
        assert_eq!(provenance.forks, Some(1));
        assert_eq!(provenance.language, None);
    }

    #[test]
    fn sort_number_falls_back_for_missing_number() {
        let numbered = assemble(record(json!({"title": "A", "number": 4})), "a/a", &ProvenanceFields::default());
        let unnumbered = assemble(record(json!({"title": "B"})), "b/b", &ProvenanceFields::default());
        assert_eq!(numbered.sort_number(), 4);
        assert_eq!(unnumbered.sort_number(), 999);
        assert_eq!(unnumbered.title(), Some("B"));
    }
}
