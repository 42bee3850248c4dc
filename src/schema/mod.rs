//! Schema layer
//!
//! Named data models the API exchanges, and the validator that checks JSON
//! values against them.
//!
//! - [`registry`] - Loads schema definitions and checks their references
//! - [`validate`] - Recursive validation of responses and request bodies
//!
//! The Campus models are embedded from `src/resources/schema.yaml`.

mod registry;
mod validate;

pub use registry::{FieldDef, FieldType, SchemaDefinition, SchemaRegistry, StringFormat};
pub use validate::{validate_request, validate_response};
