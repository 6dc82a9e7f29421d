//! Post-construction validator
//!
//! Constructed objects are opaque (`dyn Any`), so the factory records a
//! [`Snapshot`] of every field's measurable value right before calling the
//! constructor. The validator walks those snapshots depth-first:
//!
//! ```text
//! per field:  declaration check → min → max → pattern → non-empty → size
//!             then recurse into nested records (fields, [i], .key)
//! ```
//!
//! The first violation stops the walk.

use std::sync::Arc;

use crate::binding::Bound;
use crate::document::Node;
use crate::errors::{ConstraintKind, ValidationError};
use crate::mapper;
use crate::schema::{FieldSchema, Kind, RecordSchema, TypeRef};

/// Measurable view of one record's resolved fields
pub struct Snapshot {
    schema: Arc<RecordSchema>,
    measures: Vec<Measure>,
}

impl Snapshot {
    pub(crate) fn capture(schema: Arc<RecordSchema>, values: &[Bound]) -> Arc<Self> {
        let measures = values.iter().map(Measure::of).collect();
        Arc::new(Self { schema, measures })
    }

    pub fn record_name(&self) -> String {
        self.schema.display_name()
    }
}

/// What a constraint can look at
pub(crate) enum Measure {
    Absent,
    Number(f64),
    Text(String),
    /// Display form of a non-numeric, non-string scalar
    Scalar(String),
    Sized {
        len: usize,
        /// Records inside the collection, with their path suffix
        nested: Vec<(String, Arc<Snapshot>)>,
    },
    Record(Arc<Snapshot>),
    Opaque,
}

impl Measure {
    fn of(bound: &Bound) -> Self {
        match bound {
            Bound::Null => Measure::Absent,
            Bound::Str(s) => Measure::Text(s.clone()),
            Bound::Int(i) => Measure::Number(*i as f64),
            Bound::Float(f) => Measure::Number(*f),
            Bound::Bool(b) => Measure::Scalar(b.to_string()),
            Bound::Char(c) => Measure::Scalar(c.to_string()),
            Bound::Date(d) => Measure::Scalar(d.to_string()),
            Bound::DateTime(dt) => Measure::Scalar(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Bound::Document(node) => Measure::of_node(node),
            Bound::Seq(items) => {
                let mut nested = Vec::new();
                collect_nested(bound, "", &mut nested);
                Measure::Sized {
                    len: items.len(),
                    nested,
                }
            }
            Bound::Map(entries) => {
                let mut nested = Vec::new();
                collect_nested(bound, "", &mut nested);
                Measure::Sized {
                    len: entries.len(),
                    nested,
                }
            }
            Bound::Object(object) => match object.snapshot() {
                Some(snapshot) => Measure::Record(Arc::clone(snapshot)),
                None => Measure::Opaque,
            },
        }
    }

    fn of_node(node: &Node) -> Self {
        match node {
            Node::Null => Measure::Absent,
            Node::Bool(b) => Measure::Scalar(b.to_string()),
            Node::Number(n) => n.as_f64().map_or(Measure::Opaque, Measure::Number),
            Node::String(s) => Measure::Text(s.clone()),
            Node::Array(items) => Measure::Sized {
                len: items.len(),
                nested: Vec::new(),
            },
            Node::Object(map) => Measure::Sized {
                len: map.len(),
                nested: Vec::new(),
            },
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Measure::Absent => "nothing",
            Measure::Number(_) => "number",
            Measure::Text(_) => "string",
            Measure::Scalar(_) => "scalar",
            Measure::Sized { .. } => "collection",
            Measure::Record(_) => "record",
            Measure::Opaque => "opaque value",
        }
    }
}

/// Record snapshots reachable through sequences and maps
fn collect_nested(bound: &Bound, suffix: &str, out: &mut Vec<(String, Arc<Snapshot>)>) {
    match bound {
        Bound::Object(object) => {
            if let Some(snapshot) = object.snapshot() {
                out.push((suffix.to_string(), Arc::clone(snapshot)));
            }
        }
        Bound::Seq(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_nested(item, &mapper::index(suffix, i), out);
            }
        }
        Bound::Map(entries) => {
            for (key, value) in entries {
                collect_nested(value, &format!("{}.{}", suffix, entry_label(key)), out);
            }
        }
        _ => {}
    }
}

fn entry_label(key: &Bound) -> String {
    match key {
        Bound::Str(s) => s.clone(),
        Bound::Int(i) => i.to_string(),
        Bound::Bool(b) => b.to_string(),
        Bound::Char(c) => c.to_string(),
        other => other.kind_name().to_string(),
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Declarative constraint checker over bound values
pub struct Validator;

impl Validator {
    /// Validate a bound value and everything constructed inside it
    pub fn validate(bound: &Bound, path: &str) -> Result<(), ValidationError> {
        match bound {
            Bound::Object(object) => match object.snapshot() {
                Some(snapshot) => Self::validate_snapshot(snapshot, path),
                None => Ok(()),
            },
            Bound::Seq(_) | Bound::Map(_) => {
                let mut nested = Vec::new();
                collect_nested(bound, "", &mut nested);
                for (suffix, snapshot) in &nested {
                    Self::validate_snapshot(snapshot, &format!("{}{}", path, suffix))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn validate_snapshot(snapshot: &Snapshot, path: &str) -> Result<(), ValidationError> {
        for (field, measure) in snapshot.schema.fields().iter().zip(&snapshot.measures) {
            let field_path = if mapper::reads_parent_map(field) {
                path.to_string()
            } else {
                mapper::join(path, field.external_name())
            };

            check_declaration(field.type_ref(), &field_path)?;
            check_constraints(field, measure, &field_path)?;

            match measure {
                Measure::Record(nested) => Self::validate_snapshot(nested, &field_path)?,
                Measure::Sized { nested, .. } => {
                    for (suffix, nested) in nested {
                        Self::validate_snapshot(nested, &format!("{}{}", field_path, suffix))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Inline and key-as-discriminator exclude each other
pub(crate) fn check_declaration(ty: &TypeRef, path: &str) -> Result<(), ValidationError> {
    match ty.kind() {
        Kind::Capability(capability) => {
            let declaration = capability.declaration();
            if declaration.is_inline() && declaration.uses_key_as_discriminator() {
                return Err(ValidationError::InvalidPolymorphicDeclaration {
                    capability: capability.display_name(),
                    path: path.to_string(),
                });
            }
            Ok(())
        }
        Kind::Seq(element) | Kind::Set(element) | Kind::Array(element, _) => check_declaration(element, path),
        Kind::Map(params) => params.iter().try_for_each(|p| check_declaration(p, path)),
        _ => Ok(()),
    }
}

fn check_constraints(field: &FieldSchema, measure: &Measure, path: &str) -> Result<(), ValidationError> {
    let constraints = field.constraints();
    if constraints.is_empty() {
        return Ok(());
    }

    if let Some(rule) = &constraints.min {
        if let Some(value) = numeric(measure, ConstraintKind::Min, path)? {
            if value < rule.limit {
                let message = render(
                    rule.message.as_deref().unwrap_or("must be greater than or equal to {min} (was {value})"),
                    &[("min", rule.limit.to_string()), ("value", value.to_string())],
                );
                return failed(message, path);
            }
        }
    }

    if let Some(rule) = &constraints.max {
        if let Some(value) = numeric(measure, ConstraintKind::Max, path)? {
            if value > rule.limit {
                let message = render(
                    rule.message.as_deref().unwrap_or("must be less than or equal to {max} (was {value})"),
                    &[("max", rule.limit.to_string()), ("value", value.to_string())],
                );
                return failed(message, path);
            }
        }
    }

    if let Some(rule) = &constraints.pattern {
        let text = match measure {
            Measure::Text(s) | Measure::Scalar(s) => Some(s.clone()),
            Measure::Number(n) => Some(n.to_string()),
            _ => None,
        };
        if let Some(text) = text {
            if !rule.limit.is_match(&text) {
                let message = render(
                    rule.message.as_deref().unwrap_or("'{value}' does not match pattern '{pattern}'"),
                    &[("pattern", rule.limit.as_str().to_string()), ("value", text)],
                );
                return failed(message, path);
            }
        }
    }

    if let Some(rule) = &constraints.non_empty {
        let empty = match measure {
            Measure::Absent => true,
            Measure::Text(s) => s.is_empty(),
            Measure::Sized { len, .. } => *len == 0,
            Measure::Record(_) | Measure::Opaque => false,
            Measure::Number(_) | Measure::Scalar(_) => {
                return Err(ValidationError::UnsizedConstraintTarget {
                    constraint: ConstraintKind::NonEmpty,
                    found: measure.kind_name(),
                    path: path.to_string(),
                });
            }
        };
        if empty {
            let message = render(rule.message.as_deref().unwrap_or("must not be empty"), &[]);
            return failed(message, path);
        }
    }

    if let Some(rule) = &constraints.size {
        let len = match measure {
            Measure::Absent => None,
            Measure::Text(s) => Some(s.chars().count()),
            Measure::Sized { len, .. } => Some(*len),
            other => {
                return Err(ValidationError::UnsizedConstraintTarget {
                    constraint: ConstraintKind::Size,
                    found: other.kind_name(),
                    path: path.to_string(),
                });
            }
        };
        let (min, max) = rule.limit;
        if let Some(len) = len.filter(|len| *len < min || *len > max) {
            let message = render(
                rule.message.as_deref().unwrap_or("size must be between {min} and {max} (was {value})"),
                &[("min", min.to_string()), ("max", max.to_string()), ("value", len.to_string())],
            );
            return failed(message, path);
        }
    }

    Ok(())
}

/// Numeric value of a measure; `None` when absent
fn numeric(measure: &Measure, constraint: ConstraintKind, path: &str) -> Result<Option<f64>, ValidationError> {
    match measure {
        Measure::Absent => Ok(None),
        Measure::Number(n) => Ok(Some(*n)),
        other => Err(ValidationError::NonNumericConstraintTarget {
            constraint,
            found: other.kind_name(),
            path: path.to_string(),
        }),
    }
}

fn render(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |message, (name, value)| {
        message.replace(&format!("{{{}}}", name), value)
    })
}

fn failed(message: String, path: &str) -> Result<(), ValidationError> {
    Err(ValidationError::ValidationFailed {
        message,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;
    use crate::schema::{schema_of, Args, Record, SchemaBuilder};

    struct Limits;

    impl Record for Limits {
        fn schema(s: &mut SchemaBuilder) {
            s.field::<u32>("workers").min(1.0).max(64.0);
            s.field::<String>("name").pattern("^[a-z]+$").size(2, 8);
            s.field::<Vec<String>>("tags").non_empty();
            s.field::<Option<String>>("note").size(1, 4).message("note too long: {value}");
        }

        fn construct(_: &mut Args) -> Result<Self, BindError> {
            Ok(Limits)
        }
    }

    fn check(values: Vec<Bound>) -> Result<(), ValidationError> {
        let snapshot = Snapshot::capture(schema_of::<Limits>().unwrap(), &values);
        Validator::validate_snapshot(&snapshot, "limits")
    }

    fn good() -> Vec<Bound> {
        vec![
            Bound::Int(4),
            Bound::Str("api".into()),
            Bound::Seq(vec![Bound::Str("a".into())]),
            Bound::Null,
        ]
    }

    fn message_of(result: Result<(), ValidationError>) -> (String, String) {
        match result.unwrap_err() {
            ValidationError::ValidationFailed { message, path } => (message, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_values_pass() {
        assert!(check(good()).is_ok());
    }

    #[test]
    fn test_min_and_max() {
        let mut values = good();
        values[0] = Bound::Int(0);
        assert_eq!(
            message_of(check(values)),
            ("must be greater than or equal to 1 (was 0)".to_string(), "limits.workers".to_string())
        );

        let mut values = good();
        values[0] = Bound::Int(65);
        let (message, _) = message_of(check(values));
        assert_eq!(message, "must be less than or equal to 64 (was 65)");
    }

    #[test]
    fn test_pattern_runs_before_size() {
        let mut values = good();
        values[1] = Bound::Str("Api-Gateway".into());
        let (message, path) = message_of(check(values));
        assert_eq!(message, "'Api-Gateway' does not match pattern '^[a-z]+$'");
        assert_eq!(path, "limits.name");

        let mut values = good();
        values[1] = Bound::Str("a".into());
        let (message, _) = message_of(check(values));
        assert_eq!(message, "size must be between 2 and 8 (was 1)");
    }

    #[test]
    fn test_non_empty_and_custom_message() {
        let mut values = good();
        values[2] = Bound::Seq(Vec::new());
        let (message, path) = message_of(check(values));
        assert_eq!(message, "must not be empty");
        assert_eq!(path, "limits.tags");

        let mut values = good();
        values[3] = Bound::Str("too long".into());
        let (message, path) = message_of(check(values));
        assert_eq!(message, "note too long: 8");
        assert_eq!(path, "limits.note");
    }

    #[test]
    fn test_numeric_constraint_on_string_is_rejected() {
        let mut values = good();
        values[0] = Bound::Str("four".into());
        let err = check(values).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonNumericConstraintTarget { constraint: ConstraintKind::Min, .. }
        ));
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        assert_eq!(
            render("{value} not in {min}..{max}", &[("min", "1".into()), ("max", "3".into()), ("value", "9".into())]),
            "9 not in 1..3"
        );
    }
}
