//! Typed values produced by the converter
//!
//! A [`Bound`] is what the converter hands back for one document node: a
//! coerced scalar, a collection of further `Bound`s, or a constructed object
//! behind `dyn Any`. `Bindable::from_bound` turns it into the final Rust type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::document::Node;
use crate::error::BindError;
use crate::schema::short_type_name;
use crate::validator::Snapshot;

/// Converter output
pub enum Bound {
    Null,
    Str(String),
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Raw document, for `serde_json::Value` targets
    Document(Node),
    /// Sequence, set or fixed array elements in order
    Seq(Vec<Bound>),
    /// Map entries in document order
    Map(Vec<(Bound, Bound)>),
    Object(Object),
}

/// A constructed value plus what the validator needs to check it later
pub struct Object {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    snapshot: Option<Arc<Snapshot>>,
}

impl Object {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self::from_boxed(Box::new(value), std::any::type_name::<T>())
    }

    pub(crate) fn from_boxed(value: Box<dyn Any + Send>, type_name: &'static str) -> Self {
        Self {
            value,
            type_name,
            snapshot: None,
        }
    }

    pub(crate) fn with_snapshot(mut self, snapshot: Arc<Snapshot>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }
}

impl Bound {
    /// Wrap an already typed value
    pub fn object<T: Any + Send>(value: T) -> Self {
        Bound::Object(Object::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Bound::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Bound::Null => "null",
            Bound::Str(_) => "string",
            Bound::Int(_) => "integer",
            Bound::Float(_) => "float",
            Bound::Bool(_) => "boolean",
            Bound::Char(_) => "char",
            Bound::Date(_) => "date",
            Bound::DateTime(_) => "date-time",
            Bound::Document(_) => "document",
            Bound::Seq(_) => "sequence",
            Bound::Map(_) => "map",
            Bound::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bound::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Bound::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Bound::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bound::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Validation snapshot of a constructed object
    pub(crate) fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match self {
            Bound::Object(object) => object.snapshot().cloned(),
            _ => None,
        }
    }

    /// Take the constructed value out as `T`.
    ///
    /// A mismatch means a `Bindable` impl disagrees with its own `TypeRef`,
    /// so it is reported as an internal error.
    pub fn downcast<T: Any>(self, path: &str) -> Result<T, BindError> {
        let target = std::any::type_name::<T>();
        match self {
            Bound::Object(object) => {
                let found = object.type_name;
                object.value.downcast::<T>().map(|value| *value).map_err(|_| {
                    BindError::internal(
                        short_type_name(target),
                        format!("expected {} at '{}', got {}", short_type_name(target), path, short_type_name(found)),
                    )
                })
            }
            other => Err(BindError::internal(
                short_type_name(target),
                format!("expected {} at '{}', got {}", short_type_name(target), path, other.kind_name()),
            )),
        }
    }

    /// Equality used to drop duplicate set elements.
    ///
    /// Constructed objects are opaque here and never compare equal; the
    /// target set type removes those duplicates itself.
    pub fn equivalent(&self, other: &Bound) -> bool {
        match (self, other) {
            (Bound::Null, Bound::Null) => true,
            (Bound::Str(a), Bound::Str(b)) => a == b,
            (Bound::Int(a), Bound::Int(b)) => a == b,
            (Bound::Float(a), Bound::Float(b)) => a == b,
            (Bound::Bool(a), Bound::Bool(b)) => a == b,
            (Bound::Char(a), Bound::Char(b)) => a == b,
            (Bound::Date(a), Bound::Date(b)) => a == b,
            (Bound::DateTime(a), Bound::DateTime(b)) => a == b,
            (Bound::Document(a), Bound::Document(b)) => a == b,
            (Bound::Seq(a), Bound::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Bound::Map(a), Bound::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka.equivalent(kb) && va.equivalent(vb))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Null => write!(f, "Null"),
            Bound::Str(s) => write!(f, "Str({:?})", s),
            Bound::Int(i) => write!(f, "Int({})", i),
            Bound::Float(x) => write!(f, "Float({})", x),
            Bound::Bool(b) => write!(f, "Bool({})", b),
            Bound::Char(c) => write!(f, "Char({:?})", c),
            Bound::Date(d) => write!(f, "Date({})", d),
            Bound::DateTime(dt) => write!(f, "DateTime({})", dt),
            Bound::Document(node) => write!(f, "Document({})", node),
            Bound::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Bound::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Bound::Object(object) => write!(f, "Object({})", short_type_name(object.type_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_returns_the_value() {
        let bound = Bound::object(vec![1_u8, 2]);
        assert_eq!(bound.downcast::<Vec<u8>>("x").unwrap(), vec![1, 2]);
    }

    #[test]
    fn downcast_mismatch_is_internal() {
        let err = Bound::object(1_u8).downcast::<String>("name").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("BINDERY-042"));
        assert!(msg.contains("expected String at 'name', got u8"));

        let err = Bound::Int(3).downcast::<String>("name").unwrap_err();
        assert!(err.to_string().contains("got integer"));
    }

    #[test]
    fn equivalence_for_set_deduplication() {
        assert!(Bound::Str("a".into()).equivalent(&Bound::Str("a".into())));
        assert!(!Bound::Str("a".into()).equivalent(&Bound::Int(1)));
        assert!(Bound::Seq(vec![Bound::Int(1)]).equivalent(&Bound::Seq(vec![Bound::Int(1)])));
        assert!(!Bound::object(1_u8).equivalent(&Bound::object(1_u8)));
    }

    #[test]
    fn debug_is_readable() {
        let bound = Bound::Seq(vec![Bound::Str("a".into()), Bound::object(2_u8)]);
        assert_eq!(format!("{:?}", bound), "Seq([Str(\"a\"), Object(u8)])");
    }
}
