//! TextFSM parse results shaped for templates.

use log::error;
use serde_json::{Map, Value};

use crate::config::{RowShape, TextFsmOption};
use crate::encoding;
use crate::error::Result;
use crate::textfsm::{Cell, TextFsm};

fn cell_to_value(cell: Cell) -> Value {
    match cell {
        Cell::Text(text) => Value::String(text),
        Cell::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
    }
}

fn run(content: &str, options: &TextFsmOption) -> Result<Value> {
    let template = encoding::read_to_string(&options.template, &options.encoding)?;
    let fsm = TextFsm::new(&template)?;

    let rows = match options.parse_type {
        RowShape::List => {
            let records = fsm.parse_text(content)?;
            let mut rows = Vec::with_capacity(records.len() + 1);
            // No header for an empty result.
            if options.enable_header && !records.is_empty() {
                rows.push(Value::Array(fsm.header().into_iter().map(Value::from).collect()));
            }
            rows.extend(
                records
                    .into_iter()
                    .map(|row| Value::Array(row.into_iter().map(cell_to_value).collect())),
            );
            rows
        }
        RowShape::Dict => fsm
            .parse_text_to_dicts(content)?
            .into_iter()
            .map(|row| {
                let record: Map<String, Value> =
                    row.into_iter().map(|(k, v)| (k, cell_to_value(v))).collect();
                Value::Object(record)
            })
            .collect(),
    };

    Ok(Value::Array(rows))
}

/// Runs the TextFSM template named by `options` over `content`.
///
/// An unreadable or invalid template, or an `Error` action, yields `None`.
pub fn parse_textfsm(content: &str, options: &TextFsmOption) -> Option<Value> {
    match run(content, options) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Error parsing TextFSM template {}: {}", options.template.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn options(dir: &TempDir, parse_type: RowShape, enable_header: bool) -> TextFsmOption {
        let path = dir.path().join("test.textfsm");
        fs::write(&path, "Value Test1 (\\w+)\n\nStart\n  ^${Test1}\n").unwrap();
        TextFsmOption { parse_type, enable_header, ..TextFsmOption::new(path) }
    }

    #[test]
    fn test_shapes() {
        let dir = TempDir::new().unwrap();
        let cases = [
            (RowShape::Dict, true, json!([{"Test1": "abc"}])),
            (RowShape::Dict, false, json!([{"Test1": "abc"}])),
            (RowShape::List, true, json!([["Test1"], ["abc"]])),
            (RowShape::List, false, json!([["abc"]])),
        ];
        for (parse_type, enable_header, expected) in cases {
            let result = parse_textfsm("abc 123", &options(&dir, parse_type, enable_header));
            assert_eq!(result, Some(expected));
        }
    }

    #[test]
    fn test_no_match_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(parse_textfsm("", &options(&dir, RowShape::Dict, true)), Some(json!([])));
        assert_eq!(parse_textfsm("", &options(&dir, RowShape::List, true)), Some(json!([])));
    }

    #[test]
    fn test_missing_template_is_none() {
        let options = TextFsmOption::new("/no/such/template.textfsm");
        assert_eq!(parse_textfsm("abc", &options), None);
    }
}
