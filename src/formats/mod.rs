//! Structured format parsers.
//!
//! Every parser turns raw text into a [`serde_json::Value`] and reports failure as
//! `None`; nothing here panics or returns an error past this boundary.

use log::{debug, error};
use serde_json::{Map, Value};

use crate::config::{JsonOption, ParseFormat, YamlOption};

pub mod dsv;
pub mod textfsm;
pub mod xml;

pub use dsv::parse_dsv;
pub use textfsm::parse_textfsm;
pub use xml::parse_xml;

/// Plain text is passed through unchanged.
pub fn parse_plain(content: &str) -> Option<Value> {
    Some(Value::String(content.to_string()))
}

/// A document that is only `null` counts as no result.
pub fn parse_json(content: &str, _options: &JsonOption) -> Option<Value> {
    match serde_json::from_str(content) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            debug!("JSON parse failed: {}", e);
            None
        }
    }
}

/// Empty or `null` documents yield no result.
pub fn parse_yaml(content: &str, _options: &YamlOption) -> Option<Value> {
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(serde_yaml::Value::Null) => None,
        Ok(value) => Some(yaml_to_value(value)),
        Err(e) => {
            debug!("YAML parse failed: {}", e);
            None
        }
    }
}

/// Renders a scalar YAML key as a mapping key.
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_json::to_string(&yaml_to_value(other)).unwrap_or_default(),
    }
}

fn yaml_to_value(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                // NaN and infinities have no JSON form.
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_value).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_value(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(tagged.value),
    }
}

/// Dispatches `content` to the parser selected by `format`.
///
/// An unsupported format yields an empty mapping.
pub fn parse_content(content: &str, format: &ParseFormat) -> Option<Value> {
    match format {
        ParseFormat::Plain => parse_plain(content),
        ParseFormat::Json(options) => parse_json(content, options),
        ParseFormat::Yaml(options) => parse_yaml(content, options),
        ParseFormat::Xml(options) => parse_xml(content, options),
        ParseFormat::Dsv(options) => parse_dsv(content, options),
        ParseFormat::TextFsm(options) => parse_textfsm(content, options),
        ParseFormat::Unsupported(name) => {
            error!("Unsupported parse type: '{}'", name);
            Some(Value::Object(Map::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        let options = JsonOption::default();
        assert_eq!(parse_json(r#"{"a": 1, "b": 2}"#, &options), Some(json!({"a": 1, "b": 2})));
        assert_eq!(parse_json("[1,2,3]", &options), Some(json!([1, 2, 3])));
        assert_eq!(parse_json(r#"{"a": 1,"#, &options), None);
        assert_eq!(parse_json("", &options), None);
    }

    #[test]
    fn test_parse_yaml() {
        let options = YamlOption::default();
        assert_eq!(parse_yaml("a: 1\nb: 2", &options), Some(json!({"a": 1, "b": 2})));
        assert_eq!(parse_yaml("- 1\n- 2\n- 3", &options), Some(json!([1, 2, 3])));
        assert_eq!(parse_yaml("a: [1, 2\nb: }", &options), None);
    }

    #[test]
    fn test_null_documents_have_no_result() {
        assert_eq!(parse_yaml("", &YamlOption::default()), None);
        assert_eq!(parse_yaml("# only a comment\n", &YamlOption::default()), None);
        assert_eq!(parse_yaml("~", &YamlOption::default()), None);
        assert_eq!(parse_json("null", &JsonOption::default()), None);
        assert_eq!(parse_yaml("a: null", &YamlOption::default()), Some(json!({"a": null})));
    }

    #[test]
    fn test_parse_yaml_stringifies_keys() {
        let options = YamlOption::default();
        assert_eq!(
            parse_yaml("1: one\ntrue: yes\n", &options),
            Some(json!({"1": "one", "true": "yes"}))
        );
        assert_eq!(parse_yaml("!custom {a: 1}", &options), Some(json!({"a": 1})));
    }

    #[test]
    fn test_parse_yaml_keeps_document_order() {
        let value = parse_yaml("z: 1\na: 2\nm: 3", &YamlOption::default()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(parse_content("abc", &ParseFormat::Plain), Some(json!("abc")));
        assert_eq!(
            parse_content(r#"{"foo": "bar"}"#, &ParseFormat::Json(JsonOption::default())),
            Some(json!({"foo": "bar"}))
        );
        assert_eq!(
            parse_content("abc", &ParseFormat::Unsupported("toml".into())),
            Some(json!({}))
        );
    }
}
