//! Polymorphic registry: capability → discriminator → implementation
//!
//! A capability is a trait object type (`dyn Database`). Each registered
//! implementation pairs a concrete bindable type with the upcast that turns it
//! into `Box<dyn Database>`, so a resolved implementation is always assignable
//! to its capability.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::binding::{Bound, Object};
use crate::error::BindError;
use crate::schema::{short_type_name, Bindable, CapabilityRef, TypeRef};

type Upcast = Arc<dyn Fn(Bound, &str) -> Result<Bound, BindError> + Send + Sync>;

/// One concrete implementation of a capability
#[derive(Clone)]
pub struct Implementation {
    name: String,
    ty: TypeRef,
    upcast: Upcast,
}

impl Implementation {
    /// Discriminator as registered
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete type the document is bound to
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Turn the bound concrete value into the capability's boxed trait object
    pub(crate) fn upcast(&self, bound: Bound, path: &str) -> Result<Bound, BindError> {
        (self.upcast)(bound, path)
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.name, self.ty.display_name())
    }
}

/// Type-erased implementation table of one capability
#[derive(Debug, Clone)]
pub struct ImplementationTable {
    capability: &'static str,
    entries: Vec<Implementation>,
    /// lowercase name → entry
    index: HashMap<String, usize>,
}

impl ImplementationTable {
    fn new(capability: &'static str) -> Self {
        Self {
            capability,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn capability_name(&self) -> String {
        short_type_name(self.capability)
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&Implementation> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.entries[i])
    }

    /// Registered names, in registration order
    pub fn available_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Typed registration surface for capability `C`
pub struct PolymorphicRegistry<C: ?Sized + 'static> {
    table: ImplementationTable,
    _capability: PhantomData<fn() -> Box<C>>,
}

impl<C: ?Sized + 'static> PolymorphicRegistry<C>
where
    Box<C>: Send,
{
    fn new() -> Self {
        Self {
            table: ImplementationTable::new(std::any::type_name::<C>()),
            _capability: PhantomData,
        }
    }

    /// Register `T` under `name` (matched case-insensitively)
    pub fn register<T, F>(&mut self, name: &str, upcast: F) -> Result<&mut Self, BindError>
    where
        T: Bindable,
        F: Fn(T) -> Box<C> + Send + Sync + 'static,
    {
        if name.trim().is_empty() {
            return Err(BindError::InvalidImplementationName {
                capability: self.table.capability_name(),
            });
        }

        let lowered = name.to_lowercase();
        if self.table.index.contains_key(&lowered) {
            return Err(BindError::DuplicateRegistration {
                registry: "polymorphic",
                key: format!("{} for {}", name, self.table.capability_name()),
            });
        }

        let erased: Upcast = Arc::new(move |bound: Bound, path: &str| {
            let snapshot = bound.snapshot();
            let value = T::from_bound(bound, path)?;
            let object = Object::new(upcast(value));
            Ok(Bound::Object(match snapshot {
                Some(snapshot) => object.with_snapshot(snapshot),
                None => object,
            }))
        });

        tracing::debug!(
            capability = self.table.capability,
            name,
            implementation = std::any::type_name::<T>(),
            "implementation registered"
        );
        self.table.index.insert(lowered, self.table.entries.len());
        self.table.entries.push(Implementation {
            name: name.to_string(),
            ty: T::type_ref(),
            upcast: erased,
        });
        Ok(self)
    }

    /// Register `T` under its own type name, lowercased (`MySql` → `mysql`)
    pub fn register_default_name<T, F>(&mut self, upcast: F) -> Result<&mut Self, BindError>
    where
        T: Bindable,
        F: Fn(T) -> Box<C> + Send + Sync + 'static,
    {
        let name = short_type_name(std::any::type_name::<T>()).to_lowercase();
        self.register(&name, upcast)
    }

    pub fn get(&self, name: &str) -> Option<&Implementation> {
        self.table.get(name)
    }

    pub fn available_names(&self) -> Vec<String> {
        self.table.available_names()
    }
}

/// All capability tables, keyed by capability type
#[derive(Debug, Clone, Default)]
pub struct PolymorphicRegistries {
    tables: HashMap<TypeId, Arc<ImplementationTable>>,
}

impl PolymorphicRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the table for capability `C` and fill it with `configure`
    pub fn create<C, F>(&mut self, configure: F) -> Result<(), BindError>
    where
        C: ?Sized + 'static,
        Box<C>: Send,
        F: FnOnce(&mut PolymorphicRegistry<C>) -> Result<(), BindError>,
    {
        let id = TypeId::of::<C>();
        if self.tables.contains_key(&id) {
            return Err(BindError::DuplicateRegistration {
                registry: "polymorphic",
                key: short_type_name(std::any::type_name::<C>()),
            });
        }

        let mut registry = PolymorphicRegistry::<C>::new();
        configure(&mut registry)?;
        self.tables.insert(id, Arc::new(registry.table));
        Ok(())
    }

    /// Table of capability `C`
    pub fn get<C: ?Sized + 'static>(&self) -> Result<&ImplementationTable, BindError> {
        self.tables
            .get(&TypeId::of::<C>())
            .map(|t| &**t)
            .ok_or_else(|| BindError::NoRegistryForCapability {
                capability: short_type_name(std::any::type_name::<C>()),
            })
    }

    pub(crate) fn table(&self, capability: &CapabilityRef) -> Result<&ImplementationTable, BindError> {
        self.tables
            .get(&capability.id())
            .map(|t| &**t)
            .ok_or_else(|| BindError::NoRegistryForCapability {
                capability: capability.display_name(),
            })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
