//! Delimiter separated values (TSV, CSV without quoting, ...).

use serde_json::{Map, Value};

use crate::config::{DsvOption, RowShape};

fn split_rows<'a>(content: &'a str, options: &DsvOption) -> Vec<Vec<&'a str>> {
    content
        .lines()
        .filter(|line| !(options.skip_empty_lines && line.trim().is_empty()))
        .filter(|line| match options.comment_line.as_deref() {
            Some(prefix) if !prefix.is_empty() => !line.trim().starts_with(prefix),
            _ => true,
        })
        .map(|line| line.split(options.delimiter.as_str()).collect())
        .collect()
}

fn string_row(row: &[&str]) -> Value {
    Value::Array(row.iter().map(|cell| Value::from(*cell)).collect())
}

/// Parses `content` into rows of cells.
///
/// `dict` rows are keyed by the header cells (or by column index without a
/// header); cells without a matching header, and headers without a cell, are
/// dropped. Empty input is always an empty sequence.
pub fn parse_dsv(content: &str, options: &DsvOption) -> Option<Value> {
    if options.delimiter.is_empty() {
        log::error!("DSV delimiter must not be empty");
        return None;
    }

    let rows = split_rows(content, options);
    let Some((first, rest)) = rows.split_first() else {
        return Some(Value::Array(Vec::new()));
    };

    let parsed = match (options.parse_type, options.enable_header) {
        (RowShape::Dict, true) => rest
            .iter()
            .map(|row| {
                let record: Map<String, Value> = first
                    .iter()
                    .zip(row.iter())
                    .map(|(key, cell)| (key.to_string(), Value::from(*cell)))
                    .collect();
                Value::Object(record)
            })
            .collect(),
        (RowShape::Dict, false) => rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| (i.to_string(), Value::from(*cell)))
                    .collect();
                Value::Object(record)
            })
            .collect(),
        (RowShape::List, true) => rest.iter().map(|row| string_row(row)).collect(),
        (RowShape::List, false) => rows.iter().map(|row| string_row(row)).collect(),
    };

    Some(Value::Array(parsed))
}
