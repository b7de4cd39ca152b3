use serde::de::Error as _;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as Yaml;

/// Untrusted result of parsing a metadata block. Any shape is possible.
pub type RawRecord = Value;

/// Parse a metadata block without a schema.
///
/// Only syntax errors fail. A block that parses to a scalar or a sequence is
/// returned as-is and left for the sanitizer to reject. Merge keys
/// (`<<: *anchor`) are resolved before conversion.
pub fn parse(block: &str) -> Result<RawRecord, serde_yaml::Error> {
    let mut value: Yaml = serde_yaml::from_str(block)?;
    value.apply_merge()?;
    into_json(value)
}

fn into_json(value: Yaml) -> Result<Value, serde_yaml::Error> {
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => number_into_json(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(
            seq.into_iter()
                .map(into_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut fields = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = key_string(key)?;
                let value = into_json(value)?;
                // `1` and `"1"` are distinct YAML keys but collide as strings
                if fields.contains_key(&key) {
                    return Err(serde_yaml::Error::custom(format!(
                        "duplicate entry with key {:?}",
                        key
                    )));
                }
                fields.insert(key, value);
            }
            Value::Object(fields)
        }
        Yaml::Tagged(tagged) => into_json(tagged.value)?,
    })
}

fn number_into_json(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        // .nan / .inf have no JSON form
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

/// JSON objects only have string keys; YAML mappings can key on anything.
fn key_string(key: Yaml) -> Result<String, serde_yaml::Error> {
    Ok(match key {
        Yaml::String(s) => s,
        Yaml::Null => "null".to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        other => into_json(other)?.to_string(),
    })
}
