//! Core abstractions for the definition loader
//!
//! This crate provides the data model every other crate depends on: definition
//! kinds, typed locations, the naming convention, scanned records and the
//! registry trait the execution engine implements. It performs no I/O.

mod api;
mod error;
pub mod events;
mod kind;
mod location;
pub mod naming;
mod registry;
mod script;

pub use api::{ApiDefinition, ApiPath};
pub use error::{ConfigError, LoaderError, RegistryError};
pub use events::*;
pub use kind::Kind;
pub use location::Location;
pub use naming::{Identifier, Named, NamingMode};
pub use registry::{Definition, DefinitionBody, Registries, Registry};
pub use script::ScriptRecord;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;
