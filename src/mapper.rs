//! Field mapping: naming conventions, dotted paths, key components
//!
//! Declared identifiers are snake_case (`max_connections`) or camelCase
//! (`maxConnections`); documents use hyphenated names (`max-connections`).
//! Conversions are memoized process-wide.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::document::{Node, NodeMap};
use crate::error::BindError;
use crate::registry::DefaultRegistry;
use crate::schema::{FieldSchema, Kind, RecordSchema};

/// Identifier → external name memo
static EXTERNAL_NAMES: Lazy<DashMap<String, Arc<str>>> = Lazy::new(DashMap::new);

// ============================================================================
// NAMING
// ============================================================================

/// Convert a declared identifier to its hyphenated document name.
///
/// A `-` is inserted at every lower→upper boundary and every letter→digit
/// boundary; `_` counts as a separator; the result is lowercased.
///
/// ```
/// use bindery::mapper::to_external;
/// assert_eq!(&*to_external("maxConnections"), "max-connections");
/// assert_eq!(&*to_external("retry_count"), "retry-count");
/// assert_eq!(&*to_external("ipv4Address"), "ipv-4address");
/// ```
pub fn to_external(identifier: &str) -> Arc<str> {
    if let Some(name) = EXTERNAL_NAMES.get(identifier) {
        return Arc::clone(name.value());
    }

    let converted: Arc<str> = Arc::from(convert_identifier(identifier));
    EXTERNAL_NAMES.insert(identifier.to_string(), Arc::clone(&converted));
    converted
}

fn convert_identifier(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    let mut prev: Option<char> = None;

    for c in identifier.chars() {
        if c == '_' || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev = None;
            continue;
        }

        if let Some(p) = prev {
            let boundary = (p.is_lowercase() && c.is_uppercase())
                || (p.is_alphabetic() && c.is_ascii_digit());
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }

        out.extend(c.to_lowercase());
        prev = Some(c);
    }

    out.trim_end_matches('-').to_string()
}

/// Convert a hyphenated document name back to a snake_case identifier
pub fn to_identifier(external: &str) -> String {
    external.replace('-', "_")
}

/// Effective external name: a non-empty rename wins, else the derived name
pub fn external_name(identifier: &str, rename: Option<&str>) -> Arc<str> {
    match rename {
        Some(rename) if !rename.is_empty() => Arc::from(rename),
        _ => to_external(identifier),
    }
}

// ============================================================================
// PATHS
// ============================================================================

/// `join("server", "port")` → `server.port`; an empty prefix yields the name
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// `index("servers", 2)` → `servers[2]`
pub fn index(prefix: &str, i: usize) -> String {
    format!("{}[{}]", prefix, i)
}

/// Look a (possibly dotted) name up in a map.
///
/// An exact key match wins; otherwise the name is split on `.` and each step
/// must land on a map. Returns `None` at the first missing step.
pub fn navigate<'a>(map: &'a NodeMap, dotted: &str) -> Option<&'a Node> {
    if let Some(node) = map.get(dotted) {
        return Some(node);
    }
    if !dotted.contains('.') {
        return None;
    }

    let mut steps = dotted.split('.');
    let first = steps.next()?;
    let mut current = map.get(first)?;
    for step in steps {
        current = current.as_object()?.get(step)?;
    }
    Some(current)
}

// ============================================================================
// KEY COMPONENTS
// ============================================================================

/// The key field of a compound type, if it declares one
pub fn key_component(schema: &RecordSchema) -> Option<(usize, &FieldSchema)> {
    schema.fields().iter().enumerate().find(|(_, f)| f.is_key())
}

/// One entry whose key can populate a scalar key field
pub fn is_simple_key_mapping(map: &NodeMap, key_field: &FieldSchema) -> bool {
    map.len() == 1 && key_field.type_ref().is_scalar()
}

/// Whether a field's value is read from its parent's map rather than from
/// an entry of its own
pub fn reads_parent_map(field: &FieldSchema) -> bool {
    field.is_inline()
        && match field.type_ref().kind() {
            Kind::Record(_) => true,
            Kind::Capability(capability) => capability.declaration().is_inline(),
            _ => false,
        }
}

/// All names a compound type reads from its own map, inline records
/// flattened into their parent.
///
/// A fully-inline capability contributes its discriminator key: its
/// implementation's fields vary, the key does not.
pub fn external_names(schema: &RecordSchema) -> Result<Vec<Arc<str>>, BindError> {
    let mut names = Vec::with_capacity(schema.len());
    for field in schema.fields() {
        match field.type_ref().kind() {
            Kind::Record(record) if field.is_inline() => {
                let nested = record.schema()?;
                names.extend(external_names(&nested)?);
            }
            Kind::Capability(capability) if field.is_inline() && capability.declaration().is_inline() => {
                names.push(Arc::from(capability.declaration().key()));
            }
            _ => names.push(Arc::from(field.external_name())),
        }
    }
    Ok(names)
}

// ============================================================================
// DEFAULTS
// ============================================================================

/// Default node for an absent field.
///
/// `Ok(None)` means the field is optional and has no default.
pub fn resolve_default(
    defaults: &DefaultRegistry,
    field: &FieldSchema,
    path: &str,
) -> Result<Option<Node>, BindError> {
    match defaults.resolve(field.type_ref().id(), field.markers()) {
        Some(node) => Ok(Some(node)),
        None if field.is_optional() => Ok(None),
        None => Err(BindError::MissingRequiredField {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    // ═══════════════════════════════════════════
    // NAMING
    // ═══════════════════════════════════════════

    #[test]
    fn camel_and_snake_case_become_hyphenated() {
        assert_eq!(&*to_external("name"), "name");
        assert_eq!(&*to_external("maxConnections"), "max-connections");
        assert_eq!(&*to_external("max_connections"), "max-connections");
        assert_eq!(&*to_external("HTTPServer"), "httpserver");
        assert_eq!(&*to_external("retry2Times"), "retry-2times");
        assert_eq!(&*to_external("ipv4Address"), "ipv-4address");
        assert_eq!(&*to_external("already-hyphenated"), "already-hyphenated");
        assert_eq!(&*to_external("_leading"), "leading");
    }

    #[test]
    fn conversion_is_memoized() {
        let a = to_external("connectTimeout");
        let b = to_external("connectTimeout");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn rename_wins_unless_empty() {
        assert_eq!(&*external_name("host", Some("hostname")), "hostname");
        assert_eq!(&*external_name("hostName", Some("")), "host-name");
        assert_eq!(&*external_name("hostName", None), "host-name");
    }

    #[test]
    fn identifiers_round_trip_for_snake_case() {
        assert_eq!(to_identifier("max-connections"), "max_connections");
    }

    // ═══════════════════════════════════════════
    // PATHS
    // ═══════════════════════════════════════════

    #[test]
    fn paths_join_and_index() {
        assert_eq!(join("", "port"), "port");
        assert_eq!(join("server", "port"), "server.port");
        assert_eq!(index("servers", 1), "servers[1]");
        assert_eq!(join(&index("servers", 1), "port"), "servers[1].port");
    }

    #[test]
    fn navigate_descends_through_maps() {
        let node = json!({"db": {"pool": {"size": 4}}, "a.b": 1, "leaf": 3});
        let map = node.as_object().unwrap();

        assert_eq!(navigate(map, "db.pool.size"), Some(&json!(4)));
        assert_eq!(navigate(map, "a.b"), Some(&json!(1)));
        assert_eq!(navigate(map, "db.missing"), None);
        assert_eq!(navigate(map, "leaf.deeper"), None);
        assert_eq!(navigate(map, "absent"), None);
    }

    proptest! {
        #[test]
        fn external_names_are_lowercase_without_separator_runs(ident in "[a-zA-Z][a-zA-Z0-9_]{0,24}") {
            let external = to_external(&ident);
            prop_assert!(!external.chars().any(|c| c.is_uppercase()));
            prop_assert!(!external.contains("--"));
            prop_assert!(!external.contains('_'));
            prop_assert!(!external.ends_with('-'));
        }

        #[test]
        fn snake_case_identifiers_round_trip(ident in "[a-z]{1,8}(_[a-z]{1,8}){0,3}") {
            prop_assert_eq!(to_identifier(&to_external(&ident)), ident);
        }
    }
}
