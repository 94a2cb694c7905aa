use std::collections::{BTreeMap, BTreeSet};

use schemaforge_core::{normalize_id, Naming, Schema};
use serde::{Deserialize, Serialize};

/// Options consumed by the type resolver and the strategy chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    /// Emit validation rules. Disabled globally when false.
    pub validate: bool,
    /// Records with both `properties` and an `additionalProperties` schema
    /// also carry a map of the extra values.
    pub promote_additional_properties: bool,
    /// Schema identities that are never planned.
    pub exclude: BTreeSet<String>,
    /// Explicit type per schema identity (`module.Name` or a built-in name).
    pub type_overrides: BTreeMap<String, String>,
    pub naming: Naming,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            validate: true,
            promote_additional_properties: false,
            exclude: BTreeSet::new(),
            type_overrides: BTreeMap::new(),
            naming: Naming::default(),
        }
    }
}

impl PlanOptions {
    /// Whether `schema` is excluded by its extension flag or by identity.
    pub fn is_excluded(&self, schema: &Schema) -> bool {
        schema.extension.exclude || self.exclude.contains(&normalize_id(&schema.id))
    }

    /// Whether rules should be emitted for values of `schema`.
    pub fn validates(&self, schema: &Schema) -> bool {
        self.validate && !schema.extension.no_validate
    }
}
