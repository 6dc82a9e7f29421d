//! Compound types: field schemas, the schema cache and constructor arguments

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Bindable, TypeRef};
use crate::binding::Bound;
use crate::error::BindError;
use crate::errors::ConstraintKind;
use crate::mapper;
use crate::registry::defaults::{DefaultBool, DefaultDouble, DefaultInt, DefaultLong, DefaultString};

/// A compound value type with one canonical constructor.
///
/// `schema` declares the fields in constructor order; `construct` pulls
/// them back out of [`Args`] in that same order.
///
/// ```ignore
/// impl Record for Server {
///     fn schema(s: &mut SchemaBuilder) {
///         s.field::<String>("name");
///         s.field::<u16>("port").default_int(8080).min(1.0);
///     }
///
///     fn construct(args: &mut Args) -> Result<Self, BindError> {
///         Ok(Self { name: args.next()?, port: args.next()? })
///     }
/// }
/// ```
pub trait Record: Sized + Send + 'static {
    fn schema(schema: &mut SchemaBuilder);

    fn construct(args: &mut Args) -> Result<Self, BindError>;
}

// ============================================================================
// SCHEMA CACHE
// ============================================================================

/// Schemas are pure functions of their type, built once per process
static SCHEMAS: Lazy<DashMap<TypeId, Arc<RecordSchema>>> = Lazy::new(DashMap::new);

/// Cached schema of a compound type
pub fn schema_of<T: Record>() -> Result<Arc<RecordSchema>, BindError> {
    cached_schema(TypeId::of::<T>(), std::any::type_name::<T>(), T::schema)
}

pub(crate) fn cached_schema(
    id: TypeId,
    name: &'static str,
    build: fn(&mut SchemaBuilder),
) -> Result<Arc<RecordSchema>, BindError> {
    if let Some(schema) = SCHEMAS.get(&id) {
        return Ok(Arc::clone(schema.value()));
    }

    let mut builder = SchemaBuilder::new(name);
    build(&mut builder);
    let schema = Arc::new(builder.finish()?);

    tracing::trace!(record = name, fields = schema.len(), "schema built");
    Ok(Arc::clone(
        SCHEMAS.entry(id).or_insert(schema).value(),
    ))
}

// ============================================================================
// MARKERS & CONSTRAINTS
// ============================================================================

/// A declarative default marker attached to a field
#[derive(Clone)]
pub struct Marker {
    id: TypeId,
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Marker {
    pub fn new<M: Any + Send + Sync>(marker: M) -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
            value: Arc::new(marker),
        }
    }

    pub fn marker_type(&self) -> TypeId {
        self.id
    }

    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        let value: &dyn Any = &*self.value;
        value.downcast_ref::<M>()
    }

    pub(crate) fn value(&self) -> &dyn Any {
        &*self.value
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker({})", super::short_type_name(self.name))
    }
}

/// A constraint limit with an optional message template
#[derive(Debug, Clone)]
pub struct Rule<T> {
    pub limit: T,
    pub message: Option<String>,
}

impl<T> Rule<T> {
    fn new(limit: T) -> Self {
        Self {
            limit,
            message: None,
        }
    }
}

/// Validation constraints of one field
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub min: Option<Rule<f64>>,
    pub max: Option<Rule<f64>>,
    pub pattern: Option<Rule<Regex>>,
    pub non_empty: Option<Rule<()>>,
    pub size: Option<Rule<(usize, usize)>>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.non_empty.is_none()
            && self.size.is_none()
    }
}

// ============================================================================
// FIELD SCHEMA
// ============================================================================

/// Descriptor of one declared field
#[derive(Debug, Clone)]
pub struct FieldSchema {
    name: &'static str,
    rename: Option<String>,
    external: Arc<str>,
    ty: TypeRef,
    key: bool,
    inline: bool,
    markers: Vec<Marker>,
    constraints: Constraints,
}

impl FieldSchema {
    /// Declared identifier
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name used in documents (rename, else convention-derived)
    pub fn external_name(&self) -> &str {
        &self.external
    }

    pub fn rename(&self) -> Option<&str> {
        self.rename.as_deref()
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.ty.is_optional()
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }
}

/// Ordered field list of a compound type
#[derive(Debug)]
pub struct RecordSchema {
    name: &'static str,
    fields: Vec<FieldSchema>,
    key: Option<usize>,
}

impl RecordSchema {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn display_name(&self) -> String {
        super::short_type_name(self.name)
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn key_index(&self) -> Option<usize> {
        self.key
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

/// Collects field declarations for a [`RecordSchema`]
pub struct SchemaBuilder {
    record: &'static str,
    fields: Vec<FieldSchema>,
    last_constraint: Option<ConstraintKind>,
    error: Option<BindError>,
}

impl SchemaBuilder {
    pub fn new(record: &'static str) -> Self {
        Self {
            record,
            fields: Vec::new(),
            last_constraint: None,
            error: None,
        }
    }

    /// Declare the next constructor parameter
    pub fn field<T: Bindable>(&mut self, name: &'static str) -> FieldBuilder<'_> {
        self.fields.push(FieldSchema {
            name,
            rename: None,
            external: mapper::to_external(name),
            ty: T::type_ref(),
            key: false,
            inline: false,
            markers: Vec::new(),
            constraints: Constraints::default(),
        });
        self.last_constraint = None;
        let index = self.fields.len() - 1;
        FieldBuilder {
            builder: self,
            index,
        }
    }

    pub fn finish(self) -> Result<RecordSchema, BindError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let keys: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key)
            .map(|(i, _)| i)
            .collect();
        if keys.len() > 1 {
            return Err(BindError::MultipleKeyComponents {
                record: super::short_type_name(self.record),
                fields: keys.iter().map(|&i| self.fields[i].name.to_string()).collect(),
            });
        }

        Ok(RecordSchema {
            name: self.record,
            fields: self.fields,
            key: keys.first().copied(),
        })
    }
}

/// Typed configuration of the field just declared
pub struct FieldBuilder<'a> {
    builder: &'a mut SchemaBuilder,
    index: usize,
}

impl FieldBuilder<'_> {
    fn field(&mut self) -> &mut FieldSchema {
        &mut self.builder.fields[self.index]
    }

    /// Explicit document name; an empty name keeps the derived one
    pub fn rename(mut self, external: impl Into<String>) -> Self {
        let external = external.into();
        let field = self.field();
        field.external = mapper::external_name(field.name, Some(external.as_str()));
        field.rename = Some(external).filter(|r| !r.is_empty());
        self
    }

    /// Value comes from the enclosing map key
    pub fn key(mut self) -> Self {
        self.field().key = true;
        self
    }

    /// Read sub-fields from the parent's map
    pub fn inline(mut self) -> Self {
        self.field().inline = true;
        self
    }

    /// Attach any default marker
    pub fn marker<M: Any + Send + Sync>(mut self, marker: M) -> Self {
        self.field().markers.push(Marker::new(marker));
        self
    }

    pub fn default_str(self, value: impl Into<String>) -> Self {
        self.marker(DefaultString(value.into()))
    }

    pub fn default_int(self, value: i32) -> Self {
        self.marker(DefaultInt(value))
    }

    pub fn default_long(self, value: i64) -> Self {
        self.marker(DefaultLong(value))
    }

    pub fn default_double(self, value: f64) -> Self {
        self.marker(DefaultDouble(value))
    }

    pub fn default_bool(self, value: bool) -> Self {
        self.marker(DefaultBool(value))
    }

    pub fn min(mut self, limit: f64) -> Self {
        self.field().constraints.min = Some(Rule::new(limit));
        self.builder.last_constraint = Some(ConstraintKind::Min);
        self
    }

    pub fn max(mut self, limit: f64) -> Self {
        self.field().constraints.max = Some(Rule::new(limit));
        self.builder.last_constraint = Some(ConstraintKind::Max);
        self
    }

    /// Regex the value (or its display form) must match
    pub fn pattern(mut self, pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => {
                self.field().constraints.pattern = Some(Rule::new(regex));
                self.builder.last_constraint = Some(ConstraintKind::Pattern);
            }
            Err(e) => {
                let reason = format!("invalid pattern on field '{}': {}", self.field().name, e);
                let record = self.builder.record;
                self.builder
                    .error
                    .get_or_insert_with(|| BindError::internal(super::short_type_name(record), reason));
            }
        }
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.field().constraints.non_empty = Some(Rule::new(()));
        self.builder.last_constraint = Some(ConstraintKind::NonEmpty);
        self
    }

    /// Inclusive length range for strings, collections and maps
    pub fn size(mut self, min: usize, max: usize) -> Self {
        self.field().constraints.size = Some(Rule::new((min, max)));
        self.builder.last_constraint = Some(ConstraintKind::Size);
        self
    }

    /// Message template for the constraint declared just before.
    ///
    /// Placeholders: `{value}`, `{min}`, `{max}`, `{pattern}`.
    pub fn message(mut self, template: impl Into<String>) -> Self {
        let template = Some(template.into());
        let last = self.builder.last_constraint;
        let constraints = &mut self.field().constraints;
        match last {
            Some(ConstraintKind::Min) => set_message(&mut constraints.min, template),
            Some(ConstraintKind::Max) => set_message(&mut constraints.max, template),
            Some(ConstraintKind::Pattern) => set_message(&mut constraints.pattern, template),
            Some(ConstraintKind::NonEmpty) => set_message(&mut constraints.non_empty, template),
            Some(ConstraintKind::Size) => set_message(&mut constraints.size, template),
            None => {}
        }
        self
    }
}

fn set_message<T>(rule: &mut Option<Rule<T>>, message: Option<String>) {
    if let Some(rule) = rule {
        rule.message = message;
    }
}

// ============================================================================
// CONSTRUCTOR ARGUMENTS
// ============================================================================

/// Resolved field values, handed to `Record::construct` in declared order
pub struct Args {
    record: &'static str,
    values: std::vec::IntoIter<(Arc<str>, Bound)>,
    total: usize,
}

impl Args {
    pub(crate) fn new(schema: &RecordSchema, values: Vec<Bound>) -> Self {
        let total = values.len();
        let values: Vec<(Arc<str>, Bound)> = schema
            .fields()
            .iter()
            .map(|f| Arc::clone(&f.external))
            .zip(values)
            .collect();
        Self {
            record: schema.name(),
            values: values.into_iter(),
            total,
        }
    }

    /// Take the next argument as `T`
    pub fn next<T: Bindable>(&mut self) -> Result<T, BindError> {
        let (field, bound) = self.values.next().ok_or_else(|| {
            BindError::internal(
                super::short_type_name(self.record),
                format!("constructor asked for more than {} arguments", self.total),
            )
        })?;
        T::from_bound(bound, &field)
    }

    /// Discard the next argument
    pub fn skip(&mut self) -> Result<(), BindError> {
        self.values.next().map(|_| ()).ok_or_else(|| {
            BindError::internal(
                super::short_type_name(self.record),
                format!("constructor skipped past {} arguments", self.total),
            )
        })
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn finish(self) -> Result<(), BindError> {
        match self.values.len() {
            0 => Ok(()),
            left => Err(BindError::internal(
                super::short_type_name(self.record),
                format!(
                    "constructor consumed {} of {} arguments",
                    self.total - left,
                    self.total
                ),
            )),
        }
    }
}
