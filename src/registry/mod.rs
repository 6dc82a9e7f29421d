//! Registries consulted by the converter
//!
//! - `defaults`: default values for absent fields, keyed by marker type
//! - `readers`: string → value converters for opaque types
//! - `polymorphic`: discriminator → implementation, per capability
//!
//! Registries are filled through `BinderBuilder` and frozen inside the
//! `Binder`; nothing mutates them once binding starts.

pub mod defaults;
pub mod polymorphic;
pub mod readers;

pub use defaults::{DefaultBool, DefaultDouble, DefaultInt, DefaultLong, DefaultRegistry, DefaultString};
pub use polymorphic::{Implementation, ImplementationTable, PolymorphicRegistries, PolymorphicRegistry};
pub use readers::{ReaderKey, ReaderRegistry};

/// The three registries a `Binder` reads from
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub readers: ReaderRegistry,
    pub defaults: DefaultRegistry,
    pub polymorphic: PolymorphicRegistries,
}

impl Registries {
    /// Built-in default markers, no readers, no capabilities
    pub fn new() -> Self {
        Self::default()
    }
}
