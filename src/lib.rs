//! Bindery - typed binding of YAML/JSON documents
//!
//! Converts parsed document trees into strongly typed values declared by
//! the application, then validates them against declarative constraints.
//!
//! - `schema`: how a Rust type describes itself (`Bindable`, `Record`)
//! - `binding`: the converter + factory pass and the `Binder` entry points
//! - `registry`: custom readers, default values, polymorphic implementations
//! - `closed_set`: enumerations and populated singleton tables
//! - `validator`: post-construction constraint checks

pub mod binding;
pub mod builders;
pub mod closed_set;
pub mod document;
pub mod error;
pub mod errors;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod validator;

pub use binding::{BindOptions, Binder, Bound};
pub use builders::BinderBuilder;
pub use closed_set::{Enumeration, Populate, Singleton, SingletonSet};
pub use document::{Node, NodeMap};
pub use error::{BindError, Error, FixSuggestion, Result};
pub use errors::{ConstraintKind, ValidationError};
pub use registry::{DefaultBool, DefaultDouble, DefaultInt, DefaultLong, DefaultString};
pub use schema::{Args, Bindable, Polymorphic, RawKind, Record, SchemaBuilder, TypeRef};
pub use validator::Validator;
