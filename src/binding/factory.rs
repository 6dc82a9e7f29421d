//! Compound construction
//!
//! Resolves every declared field of a compound type against a document map
//! and hands the results to `Record::construct` in declared order.
//!
//! Field resolution:
//! ```text
//! key component?  ── simple (one entry, scalar key) → key = entry key, rest from entry body
//!                 ── complex (record key)          → entries split by the key record's names
//! inline record        → same map, same prefix
//! inline capability    → same map, discriminator read from it
//! otherwise            → value at external name │ default │ MissingRequiredField
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, trace};

use super::{Binder, Bound, Object};
use crate::closed_set::{schema_of_populate, Populate};
use crate::document::{kind_name, Node, NodeMap};
use crate::error::BindError;
use crate::mapper;
use crate::schema::{short_type_name, Args, CapabilityRef, FieldSchema, Kind, RecordRef, RecordSchema, TypeRef};
use crate::validator::{Snapshot, Validator};

impl Binder {
    /// Build a compound value from a document map
    pub fn create_instance(&self, node: &Node, ty: &TypeRef, prefix: &str) -> Result<Bound, BindError> {
        let Kind::Record(record) = ty.kind() else {
            return Err(BindError::NotACompoundType {
                target: ty.display_name(),
            });
        };
        let Value::Object(map) = node else {
            return Err(BindError::TypeMismatch {
                expected: ty.display_name(),
                found: kind_name(node),
                path: prefix.to_string(),
            });
        };
        self.instantiate(map, record, prefix)
    }

    pub(crate) fn instantiate(&self, map: &NodeMap, record: &RecordRef, prefix: &str) -> Result<Bound, BindError> {
        let schema = record.schema()?;
        let values = self.resolve_fields(map, &schema, prefix)?;

        let snapshot = Snapshot::capture(Arc::clone(&schema), &values);

        let mut args = Args::new(&schema, values);
        let value = record.construct(&mut args)?;
        args.finish()?;

        Ok(Bound::Object(Object::from_boxed(value, record.name()).with_snapshot(snapshot)))
    }

    /// Resolved values of every field, in declared order
    fn resolve_fields(&self, map: &NodeMap, schema: &RecordSchema, prefix: &str) -> Result<Vec<Bound>, BindError> {
        let Some((key_index, key_field)) = mapper::key_component(schema) else {
            return schema
                .fields()
                .iter()
                .map(|field| self.resolve_field(map, field, prefix))
                .collect();
        };

        if mapper::is_simple_key_mapping(map, key_field) {
            if let Some((entry_key, body)) = map.iter().next() {
                trace!(prefix, key = %entry_key, "simple key mapping");
                let key_path = mapper::join(prefix, entry_key);
                let empty = NodeMap::new();
                let body = body.as_object().unwrap_or(&empty);

                return schema
                    .fields()
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        if i == key_index {
                            self.convert(&Value::String(entry_key.clone()), field.type_ref(), &key_path)
                        } else {
                            self.resolve_field(body, field, &key_path)
                        }
                    })
                    .collect();
            }
        }

        if let Kind::Record(key_record) = key_field.type_ref().kind() {
            let key_schema = key_record.schema()?;
            let key_names = mapper::external_names(&key_schema)?;
            let (key_map, rest): (NodeMap, NodeMap) = map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .partition(|(k, _)| key_names.iter().any(|name| **name == **k));
            trace!(prefix, key_fields = key_map.len(), "complex key mapping");

            return schema
                .fields()
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    if i == key_index {
                        self.instantiate(&key_map, key_record, prefix)
                    } else {
                        self.resolve_field(&rest, field, prefix)
                    }
                })
                .collect();
        }

        schema
            .fields()
            .iter()
            .map(|field| self.resolve_field(map, field, prefix))
            .collect()
    }

    fn resolve_field(&self, map: &NodeMap, field: &FieldSchema, prefix: &str) -> Result<Bound, BindError> {
        let ty = field.type_ref();

        if field.is_inline() {
            match ty.kind() {
                Kind::Record(record) => return self.instantiate(map, record, prefix),
                Kind::Capability(capability) if capability.declaration().is_inline() => {
                    return self.convert_inline_capability(map, field, capability, prefix);
                }
                _ => trace!(field = field.name(), "inline ignored"),
            }
        }

        let path = mapper::join(prefix, field.external_name());
        let found = mapper::navigate(map, field.external_name()).filter(|v| !v.is_null());

        let lifted;
        let found = match (found, ty.kind()) {
            (Some(Value::Object(own)), Kind::Capability(capability)) if capability.declaration().is_inline() => {
                lifted = lift_discriminator(map, own, capability);
                lifted.as_ref().or(found)
            }
            _ => found,
        };

        let default;
        let node = match found {
            Some(node) => node,
            None => match mapper::resolve_default(&self.registries().defaults, field, &path)? {
                Some(node) => {
                    trace!(path = %path, "default applied");
                    default = node;
                    &default
                }
                None => return Ok(Bound::Null),
            },
        };

        self.convert(node, ty, &path)
    }

    /// Fully-inline capability: the implementation's fields and the
    /// discriminator all sit in the current map
    fn convert_inline_capability(
        &self,
        map: &NodeMap,
        field: &FieldSchema,
        capability: &CapabilityRef,
        prefix: &str,
    ) -> Result<Bound, BindError> {
        let key = capability.declaration().key();
        match map.get(key) {
            Some(discriminator) if !discriminator.is_null() => self.convert_capability(map, capability, prefix),
            _ if field.is_optional() => Ok(Bound::Null),
            _ => Err(BindError::MissingDiscriminatorKey {
                key: key.to_string(),
                capability: capability.display_name(),
                path: mapper::join(prefix, key),
            }),
        }
    }

    // ═══════════════════════════════════════════
    // SINGLETON POPULATION
    // ═══════════════════════════════════════════

    /// Overwrite the fields of `T`'s named instances from a map of
    /// `member name → fields`.
    ///
    /// Every member is resolved (and validated) before any is written. Under
    /// the set's exclusive gate `apply` then runs on a copy of each member;
    /// the copies replace the members only once all of them succeeded.
    /// Members missing from the document are left untouched.
    #[instrument(skip(self, node), fields(ty = std::any::type_name::<T>()))]
    pub fn populate<T: Populate>(&self, node: &Node, path: &str) -> crate::Result<()> {
        let set = T::instances();
        let Value::Object(map) = node else {
            return Err(BindError::TypeMismatch {
                expected: format!("map of {} members", short_type_name(std::any::type_name::<T>())),
                found: kind_name(node),
                path: path.to_string(),
            }
            .into());
        };

        let schema = schema_of_populate::<T>()?;
        let empty = NodeMap::new();
        let mut staged = Vec::with_capacity(map.len());

        for (name, body) in map {
            let member_path = mapper::join(path, name);
            let index = set.position(name).ok_or_else(|| BindError::InvalidEnumerationValue {
                value: name.clone(),
                legal: set.names().into_iter().map(String::from).collect(),
                path: member_path.clone(),
            })?;

            let body = match body {
                Value::Object(fields) => fields,
                Value::Null => &empty,
                other => {
                    return Err(BindError::TypeMismatch {
                        expected: "map".to_string(),
                        found: kind_name(other),
                        path: member_path,
                    }
                    .into())
                }
            };

            let values = self.resolve_fields(body, &schema, &member_path)?;
            if self.options().validate {
                let snapshot = Snapshot::capture(Arc::clone(&schema), &values);
                Validator::validate_snapshot(&snapshot, &member_path)?;
            }
            staged.push((index, values));
        }

        let _gate = set.write_gate();
        let mut drafts = Vec::with_capacity(staged.len());
        for (index, values) in staged {
            let cell = set.cell(index).ok_or_else(|| {
                BindError::internal(schema.display_name(), format!("no member at position {}", index))
            })?;
            let mut draft = cell.read().clone();
            let mut args = Args::new(&schema, values);
            draft.apply(&mut args)?;
            args.finish()?;
            drafts.push((cell, draft));
        }
        for (cell, draft) in drafts {
            *cell.write() = draft;
        }

        debug!(members = map.len(), "singletons populated");
        Ok(())
    }
}

/// Inline mode: a nested capability map without its own discriminator takes
/// the parent's
fn lift_discriminator(parent: &NodeMap, own: &NodeMap, capability: &CapabilityRef) -> Option<Node> {
    let key = capability.declaration().key();
    if own.contains_key(key) {
        return None;
    }
    let discriminator = parent.get(key).filter(|d| !d.is_null())?;
    let mut merged = own.clone();
    merged.insert(key.to_string(), discriminator.clone());
    Some(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Bindable, Polymorphic};
    use serde_json::json;

    trait Store: Send {}

    impl Bindable for Box<dyn Store> {
        fn type_ref() -> TypeRef {
            TypeRef::capability::<dyn Store>(Polymorphic::new("kind").inline())
        }
    }

    fn capability() -> CapabilityRef {
        match <Box<dyn Store>>::type_ref().kind() {
            Kind::Capability(capability) => capability.clone(),
            other => panic!("unexpected kind {:?}", std::mem::discriminant(other)),
        }
    }

    #[test]
    fn lift_takes_parent_discriminator() {
        let parent = json!({"kind": "disk", "store": {"dir": "/tmp"}});
        let parent = parent.as_object().unwrap();
        let own = parent["store"].as_object().unwrap();

        let lifted = lift_discriminator(parent, own, &capability()).unwrap();
        assert_eq!(lifted, json!({"dir": "/tmp", "kind": "disk"}));
    }

    #[test]
    fn lift_keeps_own_discriminator() {
        let parent = json!({"kind": "disk", "store": {"kind": "memory"}});
        let parent = parent.as_object().unwrap();
        let own = parent["store"].as_object().unwrap();

        assert!(lift_discriminator(parent, own, &capability()).is_none());
    }

    #[test]
    fn lift_needs_a_parent_value() {
        let parent = json!({"kind": null, "store": {}});
        let parent = parent.as_object().unwrap();
        let own = parent["store"].as_object().unwrap();

        assert!(lift_discriminator(parent, own, &capability()).is_none());
    }

    #[test]
    fn create_instance_rejects_scalars() {
        let err = Binder::new()
            .create_instance(&json!(1), &<Box<dyn Store>>::type_ref(), "")
            .unwrap_err();
        assert!(matches!(err, BindError::NotACompoundType { .. }));
    }
}
