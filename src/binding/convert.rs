//! Value conversion rules
//!
//! `Binder::convert` tries, in order:
//! 1. null → `Bound::Null`
//! 2. string with a custom reader (exact type, then raw container kind)
//! 3. value already of the target's shape → returned as is
//! 4. capability → discriminator lookup, then the implementation's type
//! 5. closed set → variant / member name
//! 6. sequence, set, array → element-wise (see [`Binder::convert_elements`])
//! 7. map → key and value conversion
//! 8. compound type → the factory
//! 9. scalar coercion

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, trace};

use super::{Binder, Bound, Object};
use crate::document::{kind_name, scalar_text, Node, NodeMap};
use crate::error::BindError;
use crate::mapper;
use crate::registry::Implementation;
use crate::schema::{CapabilityRef, ClosedSetRef, FloatWidth, IntWidth, Kind, Polymorphic, Scalar, TypeRef};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

impl Binder {
    /// Convert one document node to the type described by `ty`
    pub fn convert(&self, node: &Node, ty: &TypeRef, path: &str) -> Result<Bound, BindError> {
        if node.is_null() {
            return Ok(Bound::Null);
        }

        if let Value::String(s) = node {
            if let Some(bound) = self.registries().readers.convert(s, ty, path)? {
                return Ok(bound);
            }
        }

        if let Some(bound) = assignable(node, ty) {
            return Ok(bound);
        }

        match ty.kind() {
            Kind::Capability(capability) => match node {
                Value::Object(map) => self.convert_capability(map, capability, path),
                other => Err(BindError::TypeMismatch {
                    expected: format!("map with '{}' for {}", capability.declaration().key(), capability.display_name()),
                    found: kind_name(other),
                    path: path.to_string(),
                }),
            },
            Kind::ClosedSet(set) => convert_closed_set(node, set, ty, path),
            Kind::Seq(element) => self.convert_elements(node, element, path).map(Bound::Seq),
            Kind::Set(element) => {
                let items = self.convert_elements(node, element, path)?;
                Ok(Bound::Seq(dedup(items)))
            }
            Kind::Array(element, len) => {
                let items = self.convert_elements(node, element, path)?;
                if items.len() != *len {
                    return Err(BindError::ArrayLengthMismatch {
                        expected: *len,
                        found: items.len(),
                        path: path.to_string(),
                    });
                }
                Ok(Bound::Seq(items))
            }
            Kind::Map(params) => self.convert_map(node, params, ty, path),
            Kind::Record(record) => match node {
                Value::Object(map) => self.instantiate(map, record, path),
                other => Err(BindError::TypeMismatch {
                    expected: ty.display_name(),
                    found: kind_name(other),
                    path: path.to_string(),
                }),
            },
            Kind::Scalar(scalar) => coerce_scalar(node, *scalar, ty, path),
            Kind::Document => Ok(Bound::Document(node.clone())),
            Kind::Opaque => Err(unsupported(node, ty, path)),
        }
    }

    // ═══════════════════════════════════════════
    // CAPABILITIES
    // ═══════════════════════════════════════════

    /// Resolve the implementation named by the map's discriminator and bind
    /// the same map to it
    pub(crate) fn convert_capability(
        &self,
        map: &NodeMap,
        capability: &CapabilityRef,
        path: &str,
    ) -> Result<Bound, BindError> {
        let implementation = self.resolve_implementation(map, capability, path)?;
        trace!(path, implementation = implementation.name(), "discriminator resolved");

        let concrete = implementation.type_ref();
        let bound = match concrete.kind() {
            Kind::Record(record) => self.instantiate(map, record, path)?,
            _ => self.convert(&Value::Object(map.clone()), concrete, path)?,
        };
        implementation.upcast(bound, path)
    }

    fn resolve_implementation(
        &self,
        map: &NodeMap,
        capability: &CapabilityRef,
        path: &str,
    ) -> Result<&Implementation, BindError> {
        let table = self.registries().polymorphic.table(capability)?;
        let key = capability.declaration().key();

        let name = match map.get(key) {
            Some(value) if !value.is_null() => scalar_text(value),
            _ => {
                return Err(BindError::MissingDiscriminatorKey {
                    key: key.to_string(),
                    capability: capability.display_name(),
                    path: path.to_string(),
                })
            }
        };

        table.get(&name).ok_or_else(|| BindError::UnknownDiscriminator {
            name,
            capability: capability.display_name(),
            available: table.available_names(),
            path: path.to_string(),
        })
    }

    // ═══════════════════════════════════════════
    // COLLECTIONS
    // ═══════════════════════════════════════════

    /// Elements of a sequence, set or array target.
    ///
    /// - sequence → one element per item, in order
    /// - empty map → no elements
    /// - map, key-as-discriminator elements → one element per entry, entry key
    ///   merged in as the discriminator
    /// - map, compound elements whose names it does not cover → one element
    ///   per entry (the entry key feeds the element's key component)
    /// - any other map, or a scalar → a single element
    pub(crate) fn convert_elements(
        &self,
        node: &Node,
        element: &TypeRef,
        path: &str,
    ) -> Result<Vec<Bound>, BindError> {
        match node {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.convert_element(item, element, &mapper::index(path, i)))
                .collect(),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            Value::Object(map) => {
                if let Some(declaration) = key_as_discriminator(element) {
                    trace!(path, "map entries keyed by discriminator");
                    return map
                        .iter()
                        .map(|(key, value)| {
                            let entry_path = mapper::join(path, key);
                            let merged = with_discriminator(value, declaration, key, &entry_path)?;
                            self.convert_element(&merged, element, &entry_path)
                        })
                        .collect();
                }

                if let Kind::Record(record) = element.kind() {
                    let schema = record.schema()?;
                    let names = mapper::external_names(&schema)?;
                    let covered = names.iter().all(|name| map.contains_key(&**name));

                    if !covered {
                        trace!(path, entries = map.len(), "map entries become elements");
                        let keyed = mapper::key_component(&schema).is_some();
                        return map
                            .iter()
                            .map(|(key, value)| {
                                if keyed {
                                    let mut single = NodeMap::new();
                                    single.insert(key.clone(), value.clone());
                                    self.convert_element(&Value::Object(single), element, path)
                                } else {
                                    self.convert_element(value, element, &mapper::join(path, key))
                                }
                            })
                            .collect();
                    }
                }

                Ok(vec![self.convert_element(node, element, path)?])
            }
            scalar => Ok(vec![self.convert_element(scalar, element, path)?]),
        }
    }

    /// Null elements only for optional element types
    fn convert_element(&self, node: &Node, element: &TypeRef, path: &str) -> Result<Bound, BindError> {
        let bound = self.convert(node, element, path)?;
        if bound.is_null() && !element.is_optional() {
            return Err(BindError::TypeMismatch {
                expected: element.display_name(),
                found: "null",
                path: path.to_string(),
            });
        }
        Ok(bound)
    }

    fn convert_map(
        &self,
        node: &Node,
        params: &[TypeRef],
        ty: &TypeRef,
        path: &str,
    ) -> Result<Bound, BindError> {
        let [key_type, value_type] = params else {
            return Err(BindError::InvalidMapArity {
                target: ty.display_name(),
                arity: params.len(),
                path: path.to_string(),
            });
        };
        let Value::Object(map) = node else {
            return Err(BindError::TypeMismatch {
                expected: ty.display_name(),
                found: kind_name(node),
                path: path.to_string(),
            });
        };

        let discriminator = key_as_discriminator(value_type);
        map.iter()
            .map(|(key, value)| {
                let entry_path = mapper::join(path, key);
                let converted_key = self.convert(&Value::String(key.clone()), key_type, &entry_path)?;
                let converted_value = match discriminator {
                    Some(declaration) => {
                        let merged = with_discriminator(value, declaration, key, &entry_path)?;
                        self.convert_element(&merged, value_type, &entry_path)?
                    }
                    None => self.convert_element(value, value_type, &entry_path)?,
                };
                Ok((converted_key, converted_value))
            })
            .collect::<Result<Vec<_>, BindError>>()
            .map(Bound::Map)
    }
}

// ═══════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════

/// Rule 3: values that need no coercion
fn assignable(node: &Node, ty: &TypeRef) -> Option<Bound> {
    match (ty.kind(), node) {
        (Kind::Document, _) => Some(Bound::Document(node.clone())),
        (Kind::Scalar(Scalar::Str), Value::String(s)) => Some(Bound::Str(s.clone())),
        (Kind::Scalar(Scalar::Bool), Value::Bool(b)) => Some(Bound::Bool(*b)),
        (Kind::Scalar(Scalar::Int(width)), Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .filter(|i| width.contains(*i))
            .map(Bound::Int),
        (Kind::Scalar(Scalar::Float(width)), Value::Number(n)) => {
            n.as_f64().filter(|f| width.contains(*f)).map(Bound::Float)
        }
        _ => None,
    }
}

fn key_as_discriminator(ty: &TypeRef) -> Option<&Polymorphic> {
    match ty.kind() {
        Kind::Capability(capability) if capability.declaration().uses_key_as_discriminator() => {
            Some(capability.declaration())
        }
        _ => None,
    }
}

/// Copy of an entry payload with the entry key as its discriminator
fn with_discriminator(value: &Node, declaration: &Polymorphic, key: &str, path: &str) -> Result<Node, BindError> {
    let mut payload = match value {
        Value::Object(map) => map.clone(),
        Value::Null => NodeMap::new(),
        other => {
            return Err(BindError::TypeMismatch {
                expected: "map".to_string(),
                found: kind_name(other),
                path: path.to_string(),
            })
        }
    };
    payload.insert(declaration.key().to_string(), Value::String(key.to_string()));
    Ok(Value::Object(payload))
}

/// Sets keep the first of equivalent elements
fn dedup(items: Vec<Bound>) -> Vec<Bound> {
    let mut unique: Vec<Bound> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|u| u.equivalent(&item)) {
            unique.push(item);
        }
    }
    unique
}

fn convert_closed_set(node: &Node, set: &ClosedSetRef, ty: &TypeRef, path: &str) -> Result<Bound, BindError> {
    let Value::String(value) = node else {
        return Err(BindError::TypeMismatch {
            expected: ty.display_name(),
            found: kind_name(node),
            path: path.to_string(),
        });
    };

    let index = set.position(value).ok_or_else(|| BindError::InvalidEnumerationValue {
        value: value.clone(),
        legal: set.names().into_iter().map(String::from).collect(),
        path: path.to_string(),
    })?;
    let picked = set
        .pick(index)
        .ok_or_else(|| BindError::internal(ty.display_name(), format!("no member at position {}", index)))?;

    Ok(Bound::Object(Object::from_boxed(picked, ty.name())))
}

fn unsupported(node: &Node, ty: &TypeRef, path: &str) -> BindError {
    BindError::UnsupportedConversion {
        found: kind_name(node).to_string(),
        target: ty.display_name(),
        path: path.to_string(),
    }
}

// ═══════════════════════════════════════════
// SCALARS
// ═══════════════════════════════════════════

fn coerce_scalar(node: &Node, scalar: Scalar, ty: &TypeRef, path: &str) -> Result<Bound, BindError> {
    match scalar {
        Scalar::Str => match node {
            Value::String(s) => Ok(Bound::Str(s.clone())),
            Value::Number(n) => Ok(Bound::Str(n.to_string())),
            Value::Bool(b) => Ok(Bound::Str(b.to_string())),
            other => Err(unsupported(other, ty, path)),
        },
        Scalar::Int(width) => coerce_int(node, width, ty, path),
        Scalar::Float(width) => coerce_float(node, width, ty, path),
        Scalar::Bool => match node {
            Value::Bool(b) => Ok(Bound::Bool(*b)),
            Value::String(s) => Ok(Bound::Bool(lenient_bool(s, path))),
            other => Err(unsupported(other, ty, path)),
        },
        Scalar::Char => match node {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                let text = scalar_text(node);
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Bound::Char(c)),
                    _ => Err(BindError::InvalidCharLength {
                        value: text,
                        path: path.to_string(),
                    }),
                }
            }
            other => Err(unsupported(other, ty, path)),
        },
        Scalar::Date => match node {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(Bound::Date)
                .map_err(|_| BindError::InvalidDate {
                    value: s.clone(),
                    format: DATE_FORMAT,
                    path: path.to_string(),
                }),
            other => Err(unsupported(other, ty, path)),
        },
        Scalar::DateTime => match node {
            Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), DATE_TIME_FORMAT)
                .map(Bound::DateTime)
                .map_err(|_| BindError::InvalidDate {
                    value: s.clone(),
                    format: DATE_TIME_FORMAT,
                    path: path.to_string(),
                }),
            other => Err(unsupported(other, ty, path)),
        },
    }
}

/// Only a case-insensitive "true" is true. Every other string is false.
fn lenient_bool(s: &str, path: &str) -> bool {
    if s.trim().eq_ignore_ascii_case("true") {
        return true;
    }
    if !s.trim().eq_ignore_ascii_case("false") {
        debug!(path, value = s, "non-boolean string coerced to false");
    }
    false
}

fn coerce_int(node: &Node, width: IntWidth, ty: &TypeRef, path: &str) -> Result<Bound, BindError> {
    let invalid = |value: String| BindError::InvalidNumber {
        value,
        target: ty.display_name(),
        path: path.to_string(),
    };

    let value: i128 = match node {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38 => f as i128,
                    _ => return Err(invalid(n.to_string())),
                }
            }
        }
        Value::String(s) => s.trim().parse::<i128>().map_err(|_| invalid(s.clone()))?,
        other => return Err(unsupported(other, ty, path)),
    };

    if !width.contains(value) {
        return Err(BindError::NumberOutOfRange {
            value: value.to_string(),
            target: ty.display_name(),
            path: path.to_string(),
        });
    }
    Ok(Bound::Int(value))
}

fn coerce_float(node: &Node, width: FloatWidth, ty: &TypeRef, path: &str) -> Result<Bound, BindError> {
    let value = match node {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => return Err(unsupported(other, ty, path)),
    }
    .ok_or_else(|| BindError::InvalidNumber {
        value: scalar_text(node),
        target: ty.display_name(),
        path: path.to_string(),
    })?;

    if !width.contains(value) {
        return Err(BindError::NumberOutOfRange {
            value: value.to_string(),
            target: ty.display_name(),
            path: path.to_string(),
        });
    }
    Ok(Bound::Float(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Bindable;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn binder() -> Binder {
        Binder::new()
    }

    fn convert<T: Bindable>(node: Node) -> Result<Bound, BindError> {
        binder().convert(&node, &T::type_ref(), "v")
    }

    // ═══════════════════════════════════════════
    // SCALARS
    // ═══════════════════════════════════════════

    #[test]
    fn test_assignable_values_pass_through() {
        assert_eq!(convert::<String>(json!("svc")).unwrap().as_str(), Some("svc"));
        assert_eq!(convert::<bool>(json!(true)).unwrap().as_bool(), Some(true));
        assert_eq!(convert::<u16>(json!(8080)).unwrap().as_int(), Some(8080));
        assert_eq!(convert::<f64>(json!(0.25)).unwrap().as_float(), Some(0.25));
    }

    #[test]
    fn test_strings_parse_to_numbers() {
        assert_eq!(convert::<u16>(json!("8080")).unwrap().as_int(), Some(8080));
        assert_eq!(convert::<i64>(json!(" -12 ")).unwrap().as_int(), Some(-12));
        assert_eq!(convert::<f32>(json!("1.5")).unwrap().as_float(), Some(1.5));
        assert_eq!(convert::<u8>(json!(3.0)).unwrap().as_int(), Some(3));
    }

    #[test]
    fn test_number_errors() {
        assert!(matches!(convert::<u8>(json!(300)), Err(BindError::NumberOutOfRange { .. })));
        assert!(matches!(convert::<u8>(json!("-1")), Err(BindError::NumberOutOfRange { .. })));
        assert!(matches!(convert::<u8>(json!("eight")), Err(BindError::InvalidNumber { .. })));
        assert!(matches!(convert::<u8>(json!(1.5)), Err(BindError::InvalidNumber { .. })));
        assert!(matches!(convert::<f64>(json!("fast")), Err(BindError::InvalidNumber { .. })));
        assert!(matches!(convert::<u8>(json!(true)), Err(BindError::UnsupportedConversion { .. })));
    }

    #[test]
    fn test_strings_from_other_scalars() {
        assert_eq!(convert::<String>(json!(42)).unwrap().as_str(), Some("42"));
        assert_eq!(convert::<String>(json!(false)).unwrap().as_str(), Some("false"));
        assert!(matches!(convert::<String>(json!([1])), Err(BindError::UnsupportedConversion { .. })));
    }

    #[test]
    fn test_boolean_coercion_is_lenient() {
        assert_eq!(convert::<bool>(json!("TRUE")).unwrap().as_bool(), Some(true));
        assert_eq!(convert::<bool>(json!("false")).unwrap().as_bool(), Some(false));
        assert_eq!(convert::<bool>(json!("yes")).unwrap().as_bool(), Some(false));
        assert!(matches!(convert::<bool>(json!(1)), Err(BindError::UnsupportedConversion { .. })));
    }

    #[test]
    fn test_chars_and_dates() {
        assert!(matches!(convert::<char>(json!("x")).unwrap(), Bound::Char('x')));
        assert!(matches!(convert::<char>(json!(7)).unwrap(), Bound::Char('7')));
        assert!(matches!(convert::<char>(json!("xy")), Err(BindError::InvalidCharLength { .. })));
        assert!(matches!(convert::<char>(json!("")), Err(BindError::InvalidCharLength { .. })));

        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(matches!(convert::<NaiveDate>(json!("2024-01-31")).unwrap(), Bound::Date(d) if d == date));
        assert!(matches!(convert::<NaiveDate>(json!("31/01/2024")), Err(BindError::InvalidDate { .. })));
        assert!(matches!(
            convert::<NaiveDateTime>(json!("2024-01-31T12:30:00")).unwrap(),
            Bound::DateTime(_)
        ));
    }

    #[test]
    fn test_null_is_null() {
        assert!(convert::<u16>(json!(null)).unwrap().is_null());
    }

    // ═══════════════════════════════════════════
    // COLLECTIONS
    // ═══════════════════════════════════════════

    #[test]
    fn test_sequence_shapes() {
        let items = |b: Bound| match b {
            Bound::Seq(items) => items.len(),
            other => panic!("not a sequence: {:?}", other),
        };
        assert_eq!(items(convert::<Vec<u8>>(json!([1, 2, 3])).unwrap()), 3);
        assert_eq!(items(convert::<Vec<u8>>(json!(7)).unwrap()), 1);
        assert_eq!(items(convert::<Vec<u8>>(json!({})).unwrap()), 0);
        assert_eq!(items(convert::<std::collections::BTreeSet<u8>>(json!([1, 1, 2])).unwrap()), 2);
    }

    #[test]
    fn test_sequence_errors_carry_index() {
        let err = convert::<Vec<u8>>(json!([1, "x"])).unwrap_err();
        assert_eq!(err.path(), Some("v[1]"));

        let err = convert::<Vec<u8>>(json!([1, null])).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { found: "null", .. }));
        assert!(convert::<Vec<Option<u8>>>(json!([1, null])).is_ok());
    }

    #[test]
    fn test_array_length_is_checked() {
        assert!(convert::<[u8; 2]>(json!([1, 2])).is_ok());
        assert!(matches!(
            convert::<[u8; 2]>(json!([1, 2, 3])),
            Err(BindError::ArrayLengthMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn test_maps_convert_keys_and_values() {
        let bound = convert::<BTreeMap<u16, String>>(json!({"80": "http", "443": 443})).unwrap();
        let map = BTreeMap::<u16, String>::from_bound(bound, "v").unwrap();
        assert_eq!(map.get(&80).map(String::as_str), Some("http"));
        assert_eq!(map.get(&443).map(String::as_str), Some("443"));

        let err = convert::<BTreeMap<String, u8>>(json!({"a": "x"})).unwrap_err();
        assert_eq!(err.path(), Some("v.a"));
        assert!(matches!(convert::<BTreeMap<String, u8>>(json!([1])), Err(BindError::TypeMismatch { .. })));
    }

    #[test]
    fn test_map_arity_is_checked() {
        let ty = TypeRef::new::<()>(Kind::Map(vec![String::type_ref()]));
        let err = binder().convert(&json!({"a": 1}), &ty, "m").unwrap_err();
        assert!(matches!(err, BindError::InvalidMapArity { arity: 1, .. }));
    }

    #[test]
    fn test_document_targets_take_anything() {
        let node = json!({"nested": [1, {"a": null}]});
        match convert::<Value>(node.clone()).unwrap() {
            Bound::Document(doc) => assert_eq!(doc, node),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_opaque_without_reader_is_unsupported() {
        struct Secret;
        impl Bindable for Secret {
            fn type_ref() -> TypeRef {
                TypeRef::opaque::<Secret>()
            }
        }
        assert!(matches!(convert::<Secret>(json!("x")), Err(BindError::UnsupportedConversion { .. })));
    }
}
