//! Document trees
//!
//! The binder reads `serde_json::Value` trees. `serde_json` is built with
//! `preserve_order`, so map iteration follows the order keys appear in the
//! source text; collection conversion relies on that.
//!
//! The adapters below are thin wrappers over `serde_yaml` / `serde_json`.

use serde_json::{Map, Value};

use crate::error::Result;

/// A parsed document node (map, sequence or scalar)
pub type Node = Value;

/// A document map node
pub type NodeMap = Map<String, Value>;

/// Parse YAML text into a document tree
pub fn from_yaml_str(text: &str) -> Result<Node> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    Ok(from_yaml(yaml))
}

/// Parse JSON text into a document tree
pub fn from_json_str(text: &str) -> Result<Node> {
    Ok(serde_json::from_str(text)?)
}

/// Normalise a YAML value into a document node.
///
/// Non-string mapping keys are stringified, tags are dropped.
pub fn from_yaml(yaml: serde_yaml::Value) -> Node {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                map.insert(yaml_key(k), from_yaml(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        // NaN and infinities have no JSON form
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Human name of a node's kind, for error messages
pub fn kind_name(node: &Node) -> &'static str {
    match node {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

/// Short rendering of a scalar node (strings unquoted)
pub fn scalar_text(node: &Node) -> String {
    match node {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_keeps_key_order() {
        let node = from_yaml_str("b: 1\na: 2\nc: 3\n").unwrap();
        let keys: Vec<&str> = node.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn yaml_non_string_keys_are_stringified() {
        let node = from_yaml_str("8080: web\ntrue: yes\n").unwrap();
        assert_eq!(node, json!({"8080": "web", "true": "yes"}));
    }

    #[test]
    fn yaml_scalars_map_to_json_scalars() {
        let node = from_yaml_str("port: 8080\nratio: 0.5\nname: svc\nflag: false\nnone: ~\n").unwrap();
        assert_eq!(
            node,
            json!({"port": 8080, "ratio": 0.5, "name": "svc", "flag": false, "none": null})
        );
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let err = from_yaml_str("a: [1, 2").unwrap_err();
        assert!(err.to_string().contains("BINDERY-090"));
    }

    #[test]
    fn kind_names() {
        assert_eq!(kind_name(&json!({})), "map");
        assert_eq!(kind_name(&json!([])), "sequence");
        assert_eq!(kind_name(&json!("x")), "string");
        assert_eq!(scalar_text(&json!("x")), "x");
        assert_eq!(scalar_text(&json!(3)), "3");
    }
}
