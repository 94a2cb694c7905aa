use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::Plan;

/// Plans sharing one output module, with the modules they import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleGroup {
    pub module: String,
    /// Other modules referenced by the plans' dependencies.
    pub imports: BTreeSet<String>,
    /// Plans ordered by type name.
    pub plans: Vec<Plan>,
}

/// Group finished plans by the module of their type identity.
pub fn group_by_module(plans: impl IntoIterator<Item = Plan>) -> BTreeMap<String, ModuleGroup> {
    let mut groups: BTreeMap<String, ModuleGroup> = BTreeMap::new();

    for plan in plans {
        let Some(module) = plan.module().map(str::to_string) else {
            continue;
        };
        let group = groups
            .entry(module.clone())
            .or_insert_with(|| ModuleGroup {
                module: module.clone(),
                imports: BTreeSet::new(),
                plans: Vec::new(),
            });
        group.imports.extend(
            plan.dependencies
                .iter()
                .filter_map(|dependency| dependency.module())
                .filter(|dependency| *dependency != module)
                .map(str::to_string),
        );
        group.plans.push(plan);
    }

    for group in groups.values_mut() {
        group
            .plans
            .sort_by(|left, right| left.type_id.name().cmp(right.type_id.name()));
    }

    groups
}
