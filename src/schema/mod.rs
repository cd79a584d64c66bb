//! Schema module mapping entity types to their extractable fields
//!
//! # Components
//!
//! - `EntityType`: the closed set of entity categories (issue, pr, commit, comment)
//! - `SchemaRegistry`: every field each entity may expose, with its getter
//! - `FieldSelection`: the validated fields a run was configured to extract

mod entity;
mod fields;
mod registry;

pub use entity::EntityType;
pub use registry::{EntityFields, FieldGetter, FieldSelection, FieldSpec, SchemaRegistry};
