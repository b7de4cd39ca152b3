//! Validation and coercion of untrusted metadata.
//!
//! Every field with a rule in [`FIELD_RULES`] is coerced into a bounded, safe
//! value when present. Unknown fields pass through untouched. Coercion never
//! fails: a value that cannot be coerced falls back to the rule's default.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::structured::RawRecord;

/// Fallback for a `number` that cannot be read as an integer. Entries without
/// a `number` sort as if they had this value.
pub const NUMBER_FALLBACK: i64 = 999;

const MAX_TEXT_CHARS: usize = 500;
const MAX_LIST_ITEMS: usize = 20;
const MAX_ITEM_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Integer, or `fallback` when not coercible.
    Integer { fallback: i64 },
    /// Integer clamped into `min..=max`, or `fallback` when not coercible.
    BoundedInteger { min: i64, max: i64, fallback: i64 },
    /// Kept only when it starts with `http://` or `https://`, otherwise emptied.
    HttpUrl,
    /// Sequence of strings, at most `max_items` of at most `max_chars` each.
    StringList { max_items: usize, max_chars: usize },
    /// String of at most `max_chars`.
    Text { max_chars: usize },
}

const LIST: FieldRule = FieldRule::StringList {
    max_items: MAX_LIST_ITEMS,
    max_chars: MAX_ITEM_CHARS,
};
const TEXT: FieldRule = FieldRule::Text {
    max_chars: MAX_TEXT_CHARS,
};

pub const FIELD_RULES: &[(&str, FieldRule)] = &[
    ("number", FieldRule::Integer { fallback: NUMBER_FALLBACK }),
    ("difficulty", FieldRule::BoundedInteger { min: 1, max: 5, fallback: 2 }),
    ("repo_url", FieldRule::HttpUrl),
    ("demo_url", FieldRule::HttpUrl),
    ("tags", LIST),
    ("category_ja", LIST),
    ("category_en", LIST),
    ("title", TEXT),
    ("subtitle_ja", TEXT),
    ("subtitle_en", TEXT),
    ("description_ja", TEXT),
    ("description_en", TEXT),
    ("id", TEXT),
    ("slug", TEXT),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("metadata is not a mapping")]
    NotAMapping,
    #[error("metadata has no title")]
    MissingTitle,
}

/// Metadata that passed sanitization. Always has a `title` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SafeRecord(Map<String, Value>);

impl SafeRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

pub fn sanitize(raw: RawRecord) -> Result<SafeRecord, Rejection> {
    let Value::Object(mut fields) = raw else {
        return Err(Rejection::NotAMapping);
    };
    if !fields.contains_key("title") {
        return Err(Rejection::MissingTitle);
    }

    for (name, rule) in FIELD_RULES {
        if let Some(value) = fields.get_mut(*name) {
            *value = rule.coerce(value.take());
        }
    }

    Ok(SafeRecord(fields))
}

impl FieldRule {
    /// Coerce a present value. Falsy values are left alone by the URL and
    /// text rules.
    pub fn coerce(self, value: Value) -> Value {
        match self {
            FieldRule::Integer { fallback } => Value::from(as_integer(&value).unwrap_or(fallback)),
            FieldRule::BoundedInteger { min, max, fallback } => {
                let n = as_integer(&value).map_or(fallback, |n| n.clamp(min, max));
                Value::from(n)
            }
            FieldRule::HttpUrl => {
                if !is_truthy(&value) {
                    return value;
                }
                let url = text_form(&value);
                if url.starts_with("http://") || url.starts_with("https://") {
                    value
                } else {
                    Value::String(String::new())
                }
            }
            FieldRule::StringList { max_items, max_chars } => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .filter(|item| is_truthy(item))
                        .map(|item| Value::String(truncate_chars(&text_form(item), max_chars)))
                        .take(max_items)
                        .collect(),
                ),
                _ => Value::Array(Vec::new()),
            },
            FieldRule::Text { max_chars } => {
                if is_truthy(&value) {
                    Value::String(truncate_chars(&text_form(&value), max_chars))
                } else {
                    value
                }
            }
        }
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_integer)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    let t = f.trunc();
    // i64::MAX is not exactly representable; the upper bound is exclusive
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
