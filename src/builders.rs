//! One-shot binder assembly
//!
//! Registrations happen on the builder; `build` freezes them into a
//! read-only [`Binder`]. There is no way to register anything afterwards.
//!
//! ```ignore
//! let binder = Binder::builder()
//!     .custom_reader::<Duration, _>(parse_duration)?
//!     .polymorphic::<dyn Database, _>(|r| {
//!         r.register::<MySql, _>("mysql", |db| Box::new(db))?;
//!         Ok(())
//!     })?
//!     .build();
//! ```

use std::any::Any;

use crate::binding::{BindOptions, Binder, Bound};
use crate::document::Node;
use crate::error::BindError;
use crate::registry::{DefaultRegistry, PolymorphicRegistry, ReaderRegistry, Registries};
use crate::schema::{Bindable, RawKind};

// ============================================================================
// BINDER BUILDER
// ============================================================================

/// Fluent builder for a [`Binder`]
pub struct BinderBuilder {
    registries: Registries,
    options: BindOptions,
}

impl BinderBuilder {
    /// Built-in default markers, validation on
    pub fn new() -> Self {
        Self {
            registries: Registries::new(),
            options: BindOptions::default(),
        }
    }

    pub fn options(mut self, options: BindOptions) -> Self {
        self.options = options;
        self
    }

    /// Turn post-binding validation on or off
    pub fn validate(mut self, enabled: bool) -> Self {
        self.options.validate = enabled;
        self
    }

    /// Reader for string values targeting exactly `T`
    pub fn custom_reader<T, F>(mut self, f: F) -> Result<Self, BindError>
    where
        T: Bindable,
        F: Fn(&str) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.registries.readers.register::<T, F>(f)?;
        Ok(self)
    }

    /// Fallback reader for every target of a container kind
    pub fn raw_reader<F>(mut self, kind: RawKind, f: F) -> Result<Self, BindError>
    where
        F: Fn(&str) -> anyhow::Result<Bound> + Send + Sync + 'static,
    {
        self.registries.readers.register_raw(kind, f)?;
        Ok(self)
    }

    /// Default handler for marker `M` on fields of type `V`
    pub fn default_handler<V, M, F>(mut self, f: F) -> Result<Self, BindError>
    where
        V: 'static,
        M: Any,
        F: Fn(&M) -> Option<Node> + Send + Sync + 'static,
    {
        self.registries.defaults.register::<V, M, F>(f)?;
        Ok(self)
    }

    /// Default handler for marker `M` on fields of any type
    pub fn default_marker<M, F>(mut self, f: F) -> Result<Self, BindError>
    where
        M: Any,
        F: Fn(&M) -> Option<Node> + Send + Sync + 'static,
    {
        self.registries.defaults.register_any::<M, F>(f)?;
        Ok(self)
    }

    /// Implementation table for capability `C`
    pub fn polymorphic<C, F>(mut self, configure: F) -> Result<Self, BindError>
    where
        C: ?Sized + 'static,
        Box<C>: Send,
        F: FnOnce(&mut PolymorphicRegistry<C>) -> Result<(), BindError>,
    {
        self.registries.polymorphic.create::<C, F>(configure)?;
        Ok(self)
    }

    /// Direct access for registrations not covered above
    pub fn readers_mut(&mut self) -> &mut ReaderRegistry {
        &mut self.registries.readers
    }

    pub fn defaults_mut(&mut self) -> &mut DefaultRegistry {
        &mut self.registries.defaults
    }

    /// Freeze the registries
    pub fn build(self) -> Binder {
        tracing::debug!(
            readers = self.registries.readers.len(),
            defaults = self.registries.defaults.len(),
            capabilities = self.registries.polymorphic.len(),
            validate = self.options.validate,
            "binder built"
        );
        Binder::from_parts(self.registries, self.options)
    }
}

impl Default for BinderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
