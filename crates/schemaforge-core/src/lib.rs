//! Core contracts and helpers for schemaforge.
//!
//! This crate defines the schema node model, document decoding, the shared
//! schema store, type identities and naming conventions used by the planner,
//! the crawler and the CLI.

pub mod constraints;
pub mod document;
pub mod error;
pub mod graph;
pub mod naming;
pub mod schema;
pub mod store;
pub mod types;
pub mod validation;

pub use constraints::{Constraints, Discriminator, Extension};
pub use document::{decode_document, document_part, normalize_id, Document, EXTENSION_KEYWORD};
pub use error::{Error, Result};
pub use graph::{build_dependency_report, DependencyGraphSummary, DependencyReport};
pub use naming::{split_words, Naming};
pub use schema::{value_kind, AdditionalProperties, IdSource, Items, Schema};
pub use store::{dereference, Resolver, SchemaStore};
pub use types::{BuiltinKind, PrimitiveKind, TypeId};
pub use validation::validate_document;

/// Current contract version of the plan artifacts written by the CLI.
pub const PLAN_FORMAT_VERSION: &str = "0.1";
