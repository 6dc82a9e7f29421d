//! Custom reader registry
//!
//! A reader turns a string document value into a typed value. Readers are
//! looked up by the exact Rust type first (`Vec<Port>` is distinct from
//! `Vec<String>`), then by the raw container kind.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::Bound;
use crate::error::BindError;
use crate::schema::{Bindable, RawKind, TypeRef};

type Reader = Arc<dyn Fn(&str) -> anyhow::Result<Bound> + Send + Sync>;

/// Lookup key of a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderKey {
    /// One exact type, generic parameters included
    Exact(TypeId),
    /// Any type of this container kind
    Raw(RawKind),
}

struct Entry {
    name: String,
    reader: Reader,
}

/// String → value converters for opaque types
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<ReaderKey, Arc<Entry>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader producing `T` from a string
    pub fn register<T, F>(&mut self, f: F) -> Result<(), BindError>
    where
        T: Bindable,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let reader: Reader = Arc::new(move |s: &str| f(s).map(Bound::object));
        self.insert(
            ReaderKey::Exact(TypeId::of::<T>()),
            T::type_ref().display_name(),
            reader,
        )
    }

    /// Fallback reader for every type of a container kind.
    ///
    /// The reader returns the raw [`Bound`] (for example `Bound::Seq`) that
    /// the target collection is then extracted from.
    pub fn register_raw<F>(&mut self, kind: RawKind, f: F) -> Result<(), BindError>
    where
        F: Fn(&str) -> anyhow::Result<Bound> + Send + Sync + 'static,
    {
        self.insert(ReaderKey::Raw(kind), format!("{:?}", kind), Arc::new(f))
    }

    pub fn unregister<T: 'static>(&mut self) -> bool {
        self.readers.remove(&ReaderKey::Exact(TypeId::of::<T>())).is_some()
    }

    pub fn unregister_raw(&mut self, kind: RawKind) -> bool {
        self.readers.remove(&ReaderKey::Raw(kind)).is_some()
    }

    pub fn has<T: 'static>(&self) -> bool {
        self.readers.contains_key(&ReaderKey::Exact(TypeId::of::<T>()))
    }

    pub fn has_raw(&self, kind: RawKind) -> bool {
        self.readers.contains_key(&ReaderKey::Raw(kind))
    }

    pub fn clear(&mut self) {
        self.readers.clear();
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Exact match, then raw-kind fallback
    fn lookup(&self, ty: &TypeRef) -> Option<&Entry> {
        self.readers
            .get(&ReaderKey::Exact(ty.id()))
            .or_else(|| {
                ty.raw_kind()
                    .and_then(|kind| self.readers.get(&ReaderKey::Raw(kind)))
            })
            .map(|entry| &**entry)
    }

    /// Run the applicable reader on a string value.
    ///
    /// `Ok(None)` when no reader applies to `ty`.
    pub fn convert(&self, value: &str, ty: &TypeRef, path: &str) -> Result<Option<Bound>, BindError> {
        let Some(entry) = self.lookup(ty) else {
            return Ok(None);
        };

        tracing::trace!(path, reader = %entry.name, "custom reader");
        (entry.reader)(value)
            .map(Some)
            .map_err(|cause| BindError::CustomReaderFailed {
                value: value.to_string(),
                target: ty.display_name(),
                path: path.to_string(),
                cause,
            })
    }

    fn insert(&mut self, key: ReaderKey, name: String, reader: Reader) -> Result<(), BindError> {
        if self.readers.contains_key(&key) {
            return Err(BindError::DuplicateRegistration {
                registry: "custom reader",
                key: name,
            });
        }
        tracing::debug!(reader = %name, "custom reader registered");
        self.readers.insert(key, Arc::new(Entry { name, reader }));
        Ok(())
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.readers.values().map(|e| &e.name))
            .finish()
    }
}
