use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Constraint keywords carried by a schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// When set, `minimum` itself is not a valid value.
    pub exclusive_minimum: bool,
    /// When set, `maximum` itself is not a valid value.
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    /// Annotation only; no rule is derived from it.
    pub format: Option<String>,
}

impl Constraints {
    /// True when no keyword is set.
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

/// Output-control block read from the `x-schemaforge` extension keyword.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    /// Explicit target type (`module.Name` or a built-in name).
    pub type_path: Option<String>,
    pub discriminator: Option<Discriminator>,
    /// Skip planning this schema entirely.
    pub exclude: bool,
    /// Do not emit validation for values of this schema.
    pub no_validate: bool,
}

/// Discriminator configuration for a union schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    /// Name of the property holding the discriminating value.
    pub property: String,
    /// Discriminator value to absolute schema URI.
    pub mapping: BTreeMap<String, String>,
}
