//! XML documents converted to nested mappings.

use log::debug;
use roxmltree::{Document, ExpandedName, Node, ParsingOptions};
use serde_json::{Map, Value};

use crate::config::XmlOption;

fn qualified_name(name: ExpandedName) -> String {
    match name.namespace() {
        Some(ns) => format!("{{{}}}{}", ns, name.name()),
        None => name.name().to_string(),
    }
}

/// Inserts `value` under `key`, turning repeated keys into a sequence.
fn merge_child(children: &mut Map<String, Value>, key: String, value: Value) {
    match children.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(key, value);
        }
    }
}

/// Converts one element into its `(tag, value)` pair.
fn element_to_value(node: Node, options: &XmlOption) -> (String, Value) {
    let tag = qualified_name(node.tag_name());

    let mut body: Option<Map<String, Value>> = None;

    let mut children = node.children().filter(|child| child.is_element()).peekable();
    if children.peek().is_some() {
        let mut merged = Map::new();
        for child in children {
            let (key, value) = element_to_value(child, options);
            merge_child(&mut merged, key, value);
        }
        body = Some(merged);
    }

    let mut attributes = node.attributes().peekable();
    if attributes.peek().is_some() {
        let map = body.get_or_insert_with(Map::new);
        for attribute in attributes {
            let name = match attribute.namespace() {
                Some(ns) => format!("{{{}}}{}", ns, attribute.name()),
                None => attribute.name().to_string(),
            };
            let key = options.attribute_key.replace("{name}", &name);
            map.insert(key, Value::from(attribute.value()));
        }
    }

    // Text ahead of the first child element, with comments and PIs skipped.
    let leading: String = node
        .children()
        .take_while(|child| !child.is_element())
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect();
    let text = leading.trim();
    if !text.is_empty() {
        body.get_or_insert_with(Map::new)
            .insert(options.text_key.clone(), Value::from(text));
    }

    (tag, body.map_or(Value::Null, Value::Object))
}

/// Parses an XML document into `{root_tag: ...}`.
///
/// Malformed or unbalanced markup yields `None`.
pub fn parse_xml(content: &str, options: &XmlOption) -> Option<Value> {
    let parsing = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let document = match Document::parse_with_options(content, parsing) {
        Ok(document) => document,
        Err(e) => {
            debug!("XML parse failed: {}", e);
            return None;
        }
    };

    let (tag, value) = element_to_value(document.root_element(), options);
    let mut root = Map::new();
    root.insert(tag, value);
    Some(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_and_text() {
        let result = parse_xml("<root attr='val'><a>1</a></root>", &XmlOption::default());
        assert_eq!(result, Some(json!({"root": {"@attr": "val", "a": {"#text": "1"}}})));
    }

    #[test]
    fn test_empty_element_is_null() {
        assert_eq!(parse_xml("<data></data>", &XmlOption::default()), Some(json!({"data": null})));
        assert_eq!(
            parse_xml("<data>  </data>", &XmlOption::default()),
            Some(json!({"data": null}))
        );
    }

    #[test]
    fn test_repeated_children_become_sequence() {
        let result = parse_xml(
            "<list><item>a</item><other/><item>b</item><item>c</item></list>",
            &XmlOption::default(),
        );
        assert_eq!(
            result,
            Some(json!({"list": {
                "item": [{"#text": "a"}, {"#text": "b"}, {"#text": "c"}],
                "other": null
            }}))
        );
    }

    #[test]
    fn test_custom_keys() {
        let options = XmlOption { attribute_key: "_{name}".into(), text_key: "value".into() };
        let result = parse_xml(r#"<port id="1">eth0</port>"#, &options);
        assert_eq!(result, Some(json!({"port": {"_id": "1", "value": "eth0"}})));
    }

    #[test]
    fn test_namespaced_tags() {
        let result = parse_xml(r#"<r xmlns="urn:x"><a>1</a></r>"#, &XmlOption::default());
        assert_eq!(result, Some(json!({"{urn:x}r": {"{urn:x}a": {"#text": "1"}}})));
    }

    #[test]
    fn test_text_around_comments() {
        let options = XmlOption::default();
        assert_eq!(
            parse_xml("<a><!-- c -->text</a>", &options),
            Some(json!({"a": {"#text": "text"}}))
        );
        assert_eq!(parse_xml("<a>x<!--c-->y</a>", &options), Some(json!({"a": {"#text": "xy"}})));
        assert_eq!(
            parse_xml("<a><?pi data?> lead <b/>tail</a>", &options),
            Some(json!({"a": {"b": null, "#text": "lead"}}))
        );
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(parse_xml("<root><a></root>", &XmlOption::default()), None);
        assert_eq!(parse_xml("not xml", &XmlOption::default()), None);
        assert_eq!(parse_xml("", &XmlOption::default()), None);
    }
}
