//! Target type descriptors
//!
//! Every bindable Rust type describes itself with a [`TypeRef`]: a type
//! identity plus a [`Kind`] telling the converter which shape it expects.
//! Compound types additionally provide a field list through [`Record`].
//!
//! ```text
//! Bindable::type_ref()  →  TypeRef { id, name, kind, optional }
//!                                       │
//!        ┌──────────┬─────────┬─────────┼──────────┬───────────┐
//!      Scalar     Seq/Set    Map      Record    Capability  ClosedSet
//! ```

mod record;

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::binding::Bound;
use crate::error::BindError;
use crate::mapper;

pub use record::{
    schema_of, Args, Constraints, FieldBuilder, FieldSchema, Marker, Record, RecordSchema, Rule,
    SchemaBuilder,
};
pub(crate) use record::cached_schema;

// ============================================================================
// KINDS
// ============================================================================

/// Integer widths the converter range-checks against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
}

impl IntWidth {
    /// Inclusive bounds of the width
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntWidth::I8 => (i8::MIN as i128, i8::MAX as i128),
            IntWidth::I16 => (i16::MIN as i128, i16::MAX as i128),
            IntWidth::I32 => (i32::MIN as i128, i32::MAX as i128),
            IntWidth::I64 => (i64::MIN as i128, i64::MAX as i128),
            IntWidth::Isize => (isize::MIN as i128, isize::MAX as i128),
            IntWidth::U8 => (0, u8::MAX as i128),
            IntWidth::U16 => (0, u16::MAX as i128),
            IntWidth::U32 => (0, u32::MAX as i128),
            IntWidth::U64 => (0, u64::MAX as i128),
            IntWidth::Usize => (0, usize::MAX as i128),
        }
    }

    pub fn contains(self, value: i128) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    pub fn contains(self, value: f64) -> bool {
        match self {
            FloatWidth::F32 => !value.is_finite() || value.abs() <= f32::MAX as f64,
            FloatWidth::F64 => true,
        }
    }
}

/// Leaf value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Str,
    Int(IntWidth),
    Float(FloatWidth),
    Bool,
    Char,
    Date,
    DateTime,
}

/// Raw container kinds, used as the custom-reader fallback key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Seq,
    Set,
    Map,
    Array,
}

/// Shape of a target type
#[derive(Clone)]
pub enum Kind {
    Scalar(Scalar),
    /// The raw document node itself (`serde_json::Value`)
    Document,
    Seq(Box<TypeRef>),
    Set(Box<TypeRef>),
    Array(Box<TypeRef>, usize),
    /// Type parameters, normally `[key, value]`
    Map(Vec<TypeRef>),
    Record(RecordRef),
    Capability(CapabilityRef),
    ClosedSet(ClosedSetRef),
    /// Only bindable through a custom reader
    Opaque,
}

// ============================================================================
// TYPE REF
// ============================================================================

/// Descriptor of a bindable type
#[derive(Clone)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    kind: Kind,
    optional: bool,
}

impl TypeRef {
    /// Descriptor for `T` with an explicit kind
    pub fn new<T: ?Sized + 'static>(kind: Kind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
            optional: false,
        }
    }

    pub fn scalar<T: 'static>(scalar: Scalar) -> Self {
        Self::new::<T>(Kind::Scalar(scalar))
    }

    /// Descriptor for a compound type
    pub fn record<T: Record>() -> Self {
        Self::new::<T>(Kind::Record(RecordRef::of::<T>()))
    }

    /// Descriptor for `Box<C>` where `C` is a capability trait object
    pub fn capability<C: ?Sized + 'static>(declaration: Polymorphic) -> Self {
        Self::new::<Box<C>>(Kind::Capability(CapabilityRef {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
            declaration,
        }))
    }

    /// Descriptor for a fieldless enum
    pub fn enumeration<T: crate::closed_set::Enumeration>() -> Self {
        Self::new::<T>(Kind::ClosedSet(ClosedSetRef {
            names: crate::closed_set::variant_names::<T>,
            pick: crate::closed_set::pick_variant::<T>,
        }))
    }

    /// Descriptor for a type that only a custom reader can produce
    pub fn opaque<T: 'static>() -> Self {
        Self::new::<T>(Kind::Opaque)
    }

    /// Same type, absence allowed
    pub fn into_optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module paths, for messages
    pub fn display_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Scalars and closed sets; the only types a map key can populate
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, Kind::Scalar(_) | Kind::ClosedSet(_))
    }

    pub fn raw_kind(&self) -> Option<RawKind> {
        match self.kind {
            Kind::Seq(_) => Some(RawKind::Seq),
            Kind::Set(_) => Some(RawKind::Set),
            Kind::Map(_) => Some(RawKind::Map),
            Kind::Array(..) => Some(RawKind::Array),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.display_name())?;
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Strip module paths: `alloc::vec::Vec<my::Item>` → `Vec<Item>`
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

// ============================================================================
// COMPOUND / CAPABILITY / CLOSED SET REFERENCES
// ============================================================================

/// Handle to a compound type's schema and constructor
#[derive(Clone, Copy)]
pub struct RecordRef {
    id: TypeId,
    name: &'static str,
    schema: fn() -> Result<Arc<RecordSchema>, BindError>,
    construct: fn(&mut Args) -> Result<Box<dyn Any + Send>, BindError>,
}

impl RecordRef {
    pub fn of<T: Record>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            schema: schema_of::<T>,
            construct: construct_erased::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> Result<Arc<RecordSchema>, BindError> {
        (self.schema)()
    }

    pub(crate) fn construct(&self, args: &mut Args) -> Result<Box<dyn Any + Send>, BindError> {
        (self.construct)(args)
    }
}

fn construct_erased<T: Record>(args: &mut Args) -> Result<Box<dyn Any + Send>, BindError> {
    T::construct(args).map(|value| Box::new(value) as Box<dyn Any + Send>)
}

/// Polymorphic declaration of a capability type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polymorphic {
    key: String,
    inline: bool,
    key_as_discriminator: bool,
}

impl Polymorphic {
    /// Discriminator read from `key`, nested mode
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inline: false,
            key_as_discriminator: false,
        }
    }

    /// Discriminator lives in the parent map
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// The map key a value appears under is its discriminator
    pub fn key_as_discriminator(mut self) -> Self {
        self.key_as_discriminator = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn uses_key_as_discriminator(&self) -> bool {
        self.key_as_discriminator
    }
}

impl Default for Polymorphic {
    fn default() -> Self {
        Self::new("type")
    }
}

/// Capability (trait object) target
#[derive(Clone)]
pub struct CapabilityRef {
    id: TypeId,
    name: &'static str,
    declaration: Polymorphic,
}

impl CapabilityRef {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn display_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn declaration(&self) -> &Polymorphic {
        &self.declaration
    }
}

/// Fixed set of named values (enum variants or singleton members)
#[derive(Clone, Copy)]
pub struct ClosedSetRef {
    names: fn() -> Vec<&'static str>,
    pick: fn(usize) -> Option<Box<dyn Any + Send>>,
}

impl ClosedSetRef {
    pub(crate) fn new(
        names: fn() -> Vec<&'static str>,
        pick: fn(usize) -> Option<Box<dyn Any + Send>>,
    ) -> Self {
        Self { names, pick }
    }

    pub fn names(&self) -> Vec<&'static str> {
        (self.names)()
    }

    /// Exact-case match first, then the uppercased value
    pub fn position(&self, value: &str) -> Option<usize> {
        let names = self.names();
        names.iter().position(|n| *n == value).or_else(|| {
            let upper = value.to_uppercase();
            names.iter().position(|n| *n == upper)
        })
    }

    pub(crate) fn pick(&self, index: usize) -> Option<Box<dyn Any + Send>> {
        (self.pick)(index)
    }
}

// ============================================================================
// BINDABLE
// ============================================================================

/// A Rust type the binder can produce.
///
/// Compound types implement [`Record`] and return [`TypeRef::record`];
/// the default `from_bound` downcasts the constructed object.
pub trait Bindable: Sized + Send + 'static {
    fn type_ref() -> TypeRef;

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        bound.downcast(path)
    }
}

impl Bindable for String {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<String>(Scalar::Str)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Str(s) => Ok(s),
            other => other.downcast(path),
        }
    }
}

macro_rules! int_bindable {
    ($($t:ty => $width:ident),* $(,)?) => {$(
        impl Bindable for $t {
            fn type_ref() -> TypeRef {
                TypeRef::scalar::<$t>(Scalar::Int(IntWidth::$width))
            }

            fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
                match bound {
                    Bound::Int(i) => <$t>::try_from(i).map_err(|_| {
                        BindError::internal(
                            stringify!($t),
                            format!("{} out of range at '{}'", i, path),
                        )
                    }),
                    other => other.downcast(path),
                }
            }
        }
    )*};
}

int_bindable!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize,
);

impl Bindable for f64 {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<f64>(Scalar::Float(FloatWidth::F64))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Float(f) => Ok(f),
            other => other.downcast(path),
        }
    }
}

impl Bindable for f32 {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<f32>(Scalar::Float(FloatWidth::F32))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Float(f) => Ok(f as f32),
            other => other.downcast(path),
        }
    }
}

impl Bindable for bool {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<bool>(Scalar::Bool)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Bool(b) => Ok(b),
            other => other.downcast(path),
        }
    }
}

impl Bindable for char {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<char>(Scalar::Char)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Char(c) => Ok(c),
            other => other.downcast(path),
        }
    }
}

impl Bindable for NaiveDate {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<NaiveDate>(Scalar::Date)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Date(d) => Ok(d),
            other => other.downcast(path),
        }
    }
}

impl Bindable for NaiveDateTime {
    fn type_ref() -> TypeRef {
        TypeRef::scalar::<NaiveDateTime>(Scalar::DateTime)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::DateTime(dt) => Ok(dt),
            other => other.downcast(path),
        }
    }
}

impl Bindable for serde_json::Value {
    fn type_ref() -> TypeRef {
        TypeRef::new::<serde_json::Value>(Kind::Document)
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Document(node) => Ok(node),
            other => other.downcast(path),
        }
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn type_ref() -> TypeRef {
        T::type_ref().into_optional()
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Null => Ok(None),
            other => T::from_bound(other, path).map(Some),
        }
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::new::<Vec<T>>(Kind::Seq(Box::new(T::type_ref())))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Seq(items) => elements(items, path),
            other => other.downcast(path),
        }
    }
}

impl<T, S> Bindable for HashSet<T, S>
where
    T: Bindable + Eq + Hash,
    S: BuildHasher + Default + Send + 'static,
{
    fn type_ref() -> TypeRef {
        TypeRef::new::<HashSet<T, S>>(Kind::Set(Box::new(T::type_ref())))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Seq(items) => elements(items, path),
            other => other.downcast(path),
        }
    }
}

impl<T: Bindable + Ord> Bindable for BTreeSet<T> {
    fn type_ref() -> TypeRef {
        TypeRef::new::<BTreeSet<T>>(Kind::Set(Box::new(T::type_ref())))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Seq(items) => elements(items, path),
            other => other.downcast(path),
        }
    }
}

impl<T: Bindable, const N: usize> Bindable for [T; N] {
    fn type_ref() -> TypeRef {
        TypeRef::new::<[T; N]>(Kind::Array(Box::new(T::type_ref()), N))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Seq(items) => {
                let found = items.len();
                let items: Vec<T> = elements(items, path)?;
                <[T; N]>::try_from(items).map_err(|_| {
                    BindError::internal(
                        std::any::type_name::<[T; N]>(),
                        format!("expected {} elements at '{}', got {}", N, path, found),
                    )
                })
            }
            other => other.downcast(path),
        }
    }
}

impl<K, V, S> Bindable for HashMap<K, V, S>
where
    K: Bindable + Eq + Hash,
    V: Bindable,
    S: BuildHasher + Default + Send + 'static,
{
    fn type_ref() -> TypeRef {
        TypeRef::new::<HashMap<K, V, S>>(Kind::Map(vec![K::type_ref(), V::type_ref()]))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Map(entries) => entries_of(entries, path),
            other => other.downcast(path),
        }
    }
}

impl<K: Bindable + Ord, V: Bindable> Bindable for BTreeMap<K, V> {
    fn type_ref() -> TypeRef {
        TypeRef::new::<BTreeMap<K, V>>(Kind::Map(vec![K::type_ref(), V::type_ref()]))
    }

    fn from_bound(bound: Bound, path: &str) -> Result<Self, BindError> {
        match bound {
            Bound::Map(entries) => entries_of(entries, path),
            other => other.downcast(path),
        }
    }
}

/// Implement [`Bindable`] for compound types
///
/// ```ignore
/// bindery::bindable_record!(Server, Endpoint);
/// ```
#[macro_export]
macro_rules! bindable_record {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::schema::Bindable for $t {
            fn type_ref() -> $crate::schema::TypeRef {
                $crate::schema::TypeRef::record::<$t>()
            }
        }
    )+};
}

/// Implement [`Bindable`] for [`Enumeration`](crate::closed_set::Enumeration) types
#[macro_export]
macro_rules! bindable_enumeration {
    ($($t:ty),+ $(,)?) => {$(
        impl $crate::schema::Bindable for $t {
            fn type_ref() -> $crate::schema::TypeRef {
                $crate::schema::TypeRef::enumeration::<$t>()
            }
        }
    )+};
}

fn elements<T: Bindable, C: FromIterator<T>>(items: Vec<Bound>, path: &str) -> Result<C, BindError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| T::from_bound(item, &mapper::index(path, i)))
        .collect()
}

fn entries_of<K: Bindable, V: Bindable, C: FromIterator<(K, V)>>(
    entries: Vec<(Bound, Bound)>,
    path: &str,
) -> Result<C, BindError> {
    entries
        .into_iter()
        .map(|(k, v)| Ok((K::from_bound(k, path)?, V::from_bound(v, path)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_drop_module_paths() {
        assert_eq!(
            short_type_name("alloc::vec::Vec<alloc::string::String>"),
            "Vec<String>"
        );
        assert_eq!(short_type_name("dyn my_app::db::Database"), "dyn Database");
        assert_eq!(
            short_type_name("std::collections::hash::map::HashMap<u16, my::Port>"),
            "HashMap<u16, Port>"
        );
    }

    #[test]
    fn option_marks_type_optional_and_keeps_identity() {
        let plain = u16::type_ref();
        let optional = <Option<u16>>::type_ref();
        assert!(!plain.is_optional());
        assert!(optional.is_optional());
        assert_eq!(plain.id(), optional.id());
    }

    #[test]
    fn int_widths() {
        assert!(IntWidth::U8.contains(255));
        assert!(!IntWidth::U8.contains(256));
        assert!(!IntWidth::U16.contains(-1));
        assert!(IntWidth::I64.contains(i64::MIN as i128));
        assert!(FloatWidth::F32.contains(1.5));
        assert!(!FloatWidth::F32.contains(1e300));
    }

    #[test]
    fn collection_kinds() {
        assert_eq!(<Vec<String>>::type_ref().raw_kind(), Some(RawKind::Seq));
        assert_eq!(<BTreeSet<u8>>::type_ref().raw_kind(), Some(RawKind::Set));
        assert_eq!(<HashMap<String, u8>>::type_ref().raw_kind(), Some(RawKind::Map));
        assert_eq!(<[u8; 3]>::type_ref().raw_kind(), Some(RawKind::Array));
        assert_eq!(String::type_ref().raw_kind(), None);
        assert!(String::type_ref().is_scalar());
        assert!(!<Vec<String>>::type_ref().is_scalar());
    }

    #[test]
    fn polymorphic_flags() {
        let declaration = Polymorphic::new("kind").inline();
        assert_eq!(declaration.key(), "kind");
        assert!(declaration.is_inline());
        assert!(!declaration.uses_key_as_discriminator());
        assert_eq!(Polymorphic::default().key(), "type");
    }

    #[test]
    fn from_bound_extracts_collections() {
        let bound = Bound::Seq(vec![Bound::Int(1), Bound::Int(2), Bound::Int(2)]);
        let set: BTreeSet<u8> = Bindable::from_bound(bound, "ports").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2]);

        let bound = Bound::Seq(vec![Bound::Str("a".into()), Bound::Str("b".into())]);
        let arr: [String; 2] = Bindable::from_bound(bound, "pair").unwrap();
        assert_eq!(arr, ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn from_bound_rejects_wrong_shape_as_internal() {
        let err = u8::from_bound(Bound::Str("x".into()), "port").unwrap_err();
        assert!(matches!(err, BindError::InternalBinding { .. }));
        let err = u8::from_bound(Bound::Int(300), "port").unwrap_err();
        assert!(matches!(err, BindError::InternalBinding { .. }));
    }
}
