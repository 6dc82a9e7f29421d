//! Closed sets: enumerations and singleton tables
//!
//! Two flavours of "one of a fixed list of names":
//! - [`Enumeration`]: plain `Copy` enums, selected by variant name
//! - [`Populate`] + [`SingletonSet`]: pre-existing named instances whose
//!   fields the binder overwrites in place (`Binder::populate`)
//!
//! Both match document strings exactly first, then uppercased, so `debug`
//! selects `DEBUG`.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::BindError;
use crate::schema::{cached_schema, Args, Bindable, ClosedSetRef, Kind, RecordSchema, SchemaBuilder, TypeRef};

// ============================================================================
// ENUMERATIONS
// ============================================================================

/// A fieldless enum bindable from its variant names.
///
/// ```ignore
/// impl Enumeration for Level {
///     const VARIANTS: &'static [Self] = &[Level::DEBUG, Level::INFO];
///     fn name(&self) -> &'static str { /* "DEBUG" | "INFO" */ }
/// }
///
/// impl Bindable for Level {
///     fn type_ref() -> TypeRef { TypeRef::enumeration::<Level>() }
/// }
/// ```
pub trait Enumeration: Copy + Send + Sync + 'static {
    const VARIANTS: &'static [Self];

    fn name(&self) -> &'static str;
}

pub(crate) fn variant_names<T: Enumeration>() -> Vec<&'static str> {
    T::VARIANTS.iter().map(Enumeration::name).collect()
}

pub(crate) fn pick_variant<T: Enumeration>(index: usize) -> Option<Box<dyn Any + Send>> {
    T::VARIANTS
        .get(index)
        .map(|variant| Box::new(*variant) as Box<dyn Any + Send>)
}

// ============================================================================
// SINGLETON SETS
// ============================================================================

/// A type with a fixed table of named, mutable instances
pub trait Populate: Clone + Send + Sync + Sized + 'static {
    /// Fields the document may set, in the order `apply` consumes them
    fn schema(schema: &mut SchemaBuilder);

    /// Overwrite this instance's fields from resolved arguments.
    ///
    /// Called on a copy of the member; an error leaves every member as it was.
    fn apply(&mut self, args: &mut Args) -> Result<(), BindError>;

    /// The process-wide instance table
    fn instances() -> &'static SingletonSet<Self>;
}

/// Fixed table of named instances behind a set-wide write gate
pub struct SingletonSet<T> {
    members: Vec<(&'static str, Arc<RwLock<T>>)>,
    gate: RwLock<()>,
}

impl<T> SingletonSet<T> {
    pub fn new(members: impl IntoIterator<Item = (&'static str, T)>) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(name, value)| (name, Arc::new(RwLock::new(value))))
                .collect(),
            gate: RwLock::new(()),
        }
    }

    /// Exact-case match first, then the uppercased name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|(n, _)| *n == name)
            .or_else(|| {
                let upper = name.to_uppercase();
                self.members.iter().position(|(n, _)| *n == upper)
            })
    }

    pub fn get(&self, name: &str) -> Option<Singleton<T>> {
        self.position(name).and_then(|i| self.member(i))
    }

    pub fn member(&self, index: usize) -> Option<Singleton<T>> {
        self.members.get(index).map(|(name, cell)| Singleton {
            name,
            cell: Arc::clone(cell),
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.members.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Shared gate: no population runs while it is held
    pub fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read()
    }

    pub(crate) fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write()
    }

    pub(crate) fn cell(&self, index: usize) -> Option<&Arc<RwLock<T>>> {
        self.members.get(index).map(|(_, cell)| cell)
    }
}

impl<T> fmt::Debug for SingletonSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SingletonSet").field(&self.names()).finish()
    }
}

/// Handle to one member of a [`SingletonSet`]
pub struct Singleton<T> {
    name: &'static str,
    cell: Arc<RwLock<T>>,
}

impl<T> Singleton<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read()
    }

    /// Same underlying instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Singleton<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Singleton<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Singleton({})", self.name)
    }
}

impl<T: Populate> Bindable for Singleton<T> {
    fn type_ref() -> TypeRef {
        TypeRef::new::<Singleton<T>>(Kind::ClosedSet(ClosedSetRef::new(
            singleton_names::<T>,
            singleton_pick::<T>,
        )))
    }
}

fn singleton_names<T: Populate>() -> Vec<&'static str> {
    T::instances().names()
}

fn singleton_pick<T: Populate>(index: usize) -> Option<Box<dyn Any + Send>> {
    T::instances()
        .member(index)
        .map(|member| Box::new(member) as Box<dyn Any + Send>)
}

/// Cached field schema of a populated type
pub fn schema_of_populate<T: Populate>() -> Result<Arc<RecordSchema>, BindError> {
    cached_schema(TypeId::of::<T>(), std::any::type_name::<T>(), T::schema)
}
