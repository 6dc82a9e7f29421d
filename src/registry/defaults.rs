//! Default-value registry
//!
//! Maps a (value type, marker type) pair to a function that turns the marker
//! into a document node. The node then goes through the converter exactly like
//! a value read from the document, so `DefaultInt(8080)` can feed a `u16`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::document::Node;
use crate::error::BindError;
use crate::schema::{short_type_name, Marker};

/// Default string value
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultString(pub String);

/// Default 32-bit integer value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultInt(pub i32);

/// Default 64-bit integer value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultLong(pub i64);

/// Default floating point value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultDouble(pub f64);

/// Default boolean value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultBool(pub bool);

type Handler = Arc<dyn Fn(&dyn Any) -> Option<Node> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ValueKey {
    Exact(TypeId),
    Any,
}

/// (value type, marker type) → default extraction
#[derive(Clone)]
pub struct DefaultRegistry {
    handlers: HashMap<(ValueKey, TypeId), Handler>,
}

impl DefaultRegistry {
    /// Registry with the built-in string/int/long/double/bool markers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.insert(ValueKey::Any, TypeId::of::<DefaultString>(), wrap(|m: &DefaultString| Some(Value::String(m.0.clone()))));
        registry.insert(ValueKey::Any, TypeId::of::<DefaultInt>(), wrap(|m: &DefaultInt| Some(Value::from(m.0))));
        registry.insert(ValueKey::Any, TypeId::of::<DefaultLong>(), wrap(|m: &DefaultLong| Some(Value::from(m.0))));
        registry.insert(
            ValueKey::Any,
            TypeId::of::<DefaultDouble>(),
            wrap(|m: &DefaultDouble| serde_json::Number::from_f64(m.0).map(Value::Number)),
        );
        registry.insert(ValueKey::Any, TypeId::of::<DefaultBool>(), wrap(|m: &DefaultBool| Some(Value::Bool(m.0))));
        registry
    }

    /// Registry without any handler
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Handler for marker `M` on fields of type `V`
    pub fn register<V, M, F>(&mut self, f: F) -> Result<(), BindError>
    where
        V: 'static,
        M: Any,
        F: Fn(&M) -> Option<Node> + Send + Sync + 'static,
    {
        self.try_insert::<M>(ValueKey::Exact(TypeId::of::<V>()), std::any::type_name::<V>(), wrap(f))
    }

    /// Handler for marker `M` on fields of any type
    pub fn register_any<M, F>(&mut self, f: F) -> Result<(), BindError>
    where
        M: Any,
        F: Fn(&M) -> Option<Node> + Send + Sync + 'static,
    {
        self.try_insert::<M>(ValueKey::Any, "any", wrap(f))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First non-`None` default produced by `markers`, in declaration order.
    ///
    /// For each marker a handler registered for the exact value type is tried
    /// before one registered for any type.
    pub fn resolve(&self, value_type: TypeId, markers: &[Marker]) -> Option<Node> {
        markers.iter().find_map(|marker| {
            let marker_type = marker.marker_type();
            [ValueKey::Exact(value_type), ValueKey::Any]
                .iter()
                .filter_map(|key| self.handlers.get(&(*key, marker_type)))
                .find_map(|handler| handler(marker.value()))
        })
    }

    fn try_insert<M: Any>(&mut self, key: ValueKey, value_name: &str, handler: Handler) -> Result<(), BindError> {
        let marker = TypeId::of::<M>();
        if self.handlers.contains_key(&(key, marker)) {
            return Err(BindError::DuplicateRegistration {
                registry: "default handler",
                key: format!(
                    "{} on {}",
                    short_type_name(std::any::type_name::<M>()),
                    short_type_name(value_name)
                ),
            });
        }
        tracing::debug!(marker = std::any::type_name::<M>(), value = value_name, "default handler registered");
        self.insert(key, marker, handler);
        Ok(())
    }

    fn insert(&mut self, key: ValueKey, marker: TypeId, handler: Handler) {
        self.handlers.insert((key, marker), handler);
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn wrap<M, F>(f: F) -> Handler
where
    M: Any,
    F: Fn(&M) -> Option<Node> + Send + Sync + 'static,
{
    Arc::new(move |marker: &dyn Any| marker.downcast_ref::<M>().and_then(&f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Unhandled;

    #[derive(Clone, Copy)]
    struct Seconds(u64);

    #[test]
    fn builtin_markers_produce_nodes() {
        let registry = DefaultRegistry::new();
        let id = TypeId::of::<String>();

        assert_eq!(registry.resolve(id, &[Marker::new(DefaultString("x".into()))]), Some(json!("x")));
        assert_eq!(registry.resolve(id, &[Marker::new(DefaultInt(8080))]), Some(json!(8080)));
        assert_eq!(registry.resolve(id, &[Marker::new(DefaultLong(1 << 40))]), Some(json!(1_i64 << 40)));
        assert_eq!(registry.resolve(id, &[Marker::new(DefaultDouble(0.5))]), Some(json!(0.5)));
        assert_eq!(registry.resolve(id, &[Marker::new(DefaultBool(true))]), Some(json!(true)));
        assert_eq!(registry.resolve(id, &[Marker::new(DefaultDouble(f64::NAN))]), None);
    }

    #[test]
    fn first_applicable_marker_wins() {
        let registry = DefaultRegistry::new();
        let markers = [
            Marker::new(Unhandled),
            Marker::new(DefaultInt(1)),
            Marker::new(DefaultInt(2)),
        ];
        assert_eq!(registry.resolve(TypeId::of::<u32>(), &markers), Some(json!(1)));
        assert_eq!(registry.resolve(TypeId::of::<u32>(), &[Marker::new(Unhandled)]), None);
        assert_eq!(registry.resolve(TypeId::of::<u32>(), &[]), None);
    }

    #[test]
    fn exact_value_type_beats_any() {
        let mut registry = DefaultRegistry::new();
        registry
            .register::<u64, DefaultInt, _>(|m| Some(json!(m.0 as i64 * 1000)))
            .unwrap();
        let markers = [Marker::new(DefaultInt(3))];

        assert_eq!(registry.resolve(TypeId::of::<u64>(), &markers), Some(json!(3000)));
        assert_eq!(registry.resolve(TypeId::of::<u32>(), &markers), Some(json!(3)));
    }

    #[test]
    fn custom_marker_for_custom_type() {
        let mut registry = DefaultRegistry::empty();
        registry
            .register::<String, Seconds, _>(|m| Some(json!(format!("{}s", m.0))))
            .unwrap();

        assert_eq!(
            registry.resolve(TypeId::of::<String>(), &[Marker::new(Seconds(30))]),
            Some(json!("30s"))
        );
        assert_eq!(registry.resolve(TypeId::of::<u8>(), &[Marker::new(Seconds(30))]), None);
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let mut registry = DefaultRegistry::new();
        let err = registry
            .register_any::<DefaultInt, _>(|m| Some(json!(m.0)))
            .unwrap_err();
        assert!(matches!(err, BindError::DuplicateRegistration { registry: "default handler", .. }));
    }
}
