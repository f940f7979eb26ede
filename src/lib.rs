//! Hydrate decoded JSON documents into graphs of declared, typed instances.
//!
//! Types are registered with their property declarations; loading a document
//! extracts each type's schema once, fills declared defaults, resolves union
//! types against the actual values and builds the instance graph depth-first.
pub mod defaults;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
mod instantiate;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod state;

pub use descriptor::{Candidate, PropertyDescriptor};
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use error::{ErrorKind, LoadError};
pub use loader::{LoadOptions, Loader};
pub use registry::{Model, TypeDecl, TypeRegistry};
pub use schema::{Schema, SchemaCache};
pub use state::{Hydrated, InstanceId, InstanceState, ObjectGraph, Phase, StateStore};
