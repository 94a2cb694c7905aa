use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::group::ModuleGroup;

/// Emit the JSON Schema for `plans/<module>.json`.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(ModuleGroup)
}
