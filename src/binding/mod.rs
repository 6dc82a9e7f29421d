//! Binding Module - document trees to typed values
//!
//! The converter and the factory are one recursive pass over the document:
//! - `convert`: per-value coercion rules (scalars, collections, maps,
//!   capabilities, closed sets)
//! - `factory`: compound construction, key components, inline fields and
//!   singleton population
//! - `bound`: the typed intermediate value both of them produce
//!
//! Data flow:
//! ```text
//! Node ──convert──► Bound ──validate──► Bound ──from_bound──► T
//!          │   ▲
//!          ▼   │
//!        factory (Record::construct)
//! ```

mod bound;
mod convert;
mod factory;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, instrument};

pub use bound::{Bound, Object};

use crate::builders::BinderBuilder;
use crate::document::{self, Node};
use crate::error::{BindError, Result};
use crate::errors::ValidationError;
use crate::registry::Registries;
use crate::schema::Bindable;
use crate::validator::{self, Validator};

/// Binder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Run the validator on every bound value
    pub validate: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

struct Inner {
    registries: Registries,
    options: BindOptions,
}

/// Frozen registries plus the binding entry points.
///
/// Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct Binder {
    inner: Arc<Inner>,
}

impl Binder {
    pub fn builder() -> BinderBuilder {
        BinderBuilder::new()
    }

    /// Built-in defaults, no readers, no capabilities, validation on
    pub fn new() -> Self {
        Self::from_parts(Registries::new(), BindOptions::default())
    }

    pub(crate) fn from_parts(registries: Registries, options: BindOptions) -> Self {
        Self {
            inner: Arc::new(Inner { registries, options }),
        }
    }

    pub fn options(&self) -> &BindOptions {
        &self.inner.options
    }

    pub fn registries(&self) -> &Registries {
        &self.inner.registries
    }

    /// Bind a whole document to `T`
    #[instrument(skip(self, root), fields(ty = std::any::type_name::<T>()))]
    pub fn bind<T: Bindable>(&self, root: &Node) -> Result<T> {
        self.bind_at(root, "")
    }

    /// Bind a document fragment, reporting paths under `path`
    pub fn bind_at<T: Bindable>(&self, node: &Node, path: &str) -> Result<T> {
        let ty = T::type_ref();
        if self.inner.options.validate {
            validator::check_declaration(&ty, path)?;
        }
        let bound = self.convert(node, &ty, path)?;

        if bound.is_null() && !ty.is_optional() {
            return Err(BindError::TypeMismatch {
                expected: ty.display_name(),
                found: "null",
                path: path.to_string(),
            }
            .into());
        }

        if self.inner.options.validate {
            Validator::validate(&bound, path)?;
        }

        let value = T::from_bound(bound, path)?;
        debug!(target_type = %ty.display_name(), "bound");
        Ok(value)
    }

    /// Parse YAML text and bind it
    pub fn bind_yaml<T: Bindable>(&self, text: &str) -> Result<T> {
        let root = document::from_yaml_str(text)?;
        self.bind(&root)
    }

    /// Parse JSON text and bind it
    pub fn bind_json<T: Bindable>(&self, text: &str) -> Result<T> {
        let root = document::from_json_str(text)?;
        self.bind(&root)
    }

    /// Check the constraints of an already bound value.
    ///
    /// Works whether or not this binder validates while binding.
    pub fn validate(&self, bound: &Bound, path: &str) -> std::result::Result<(), ValidationError> {
        Validator::validate(bound, path)
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("registries", &self.inner.registries)
            .field("options", &self.inner.options)
            .finish()
    }
}
