use std::sync::Arc;

use schemaforge_core::{Items, PrimitiveKind, Schema, TypeId};

use super::{Outcome, PlanContext, Planner};
use crate::errors::Result;
use crate::model::{Plan, PlanKind, Slot, TuplePlan};
use crate::rules::derive_value_rules;

/// Array with positional `items`: one typed slot per position.
#[derive(Debug, Clone, Copy, Default)]
pub struct TuplePlanner;

impl Planner for TuplePlanner {
    fn name(&self) -> &'static str {
        "tuple"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_tuple(ctx, schema).into()
    }
}

fn plan_tuple(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.effective_kind() != PrimitiveKind::Array {
        return Ok(None);
    }
    let Some(Items::Tuple(items)) = &schema.items else {
        return Ok(None);
    };

    let mut slots = Vec::with_capacity(items.len());
    let mut discovered = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let target = ctx.typer.dereference(item)?;
        let scope = ctx.scope(&format!("Item{index}"));

        let slot = match ctx.typer.resolve(item, None)? {
            Some(type_id) => {
                discovered.extend(ctx.discover(item, &type_id)?);
                Slot {
                    index,
                    rules: derive_value_rules(&target, &type_id, &scope, ctx.options)?,
                    type_id,
                    deferred: false,
                }
            }
            None => {
                // Open slot: rules for the declared kind run after a type check.
                let rules = match target.effective_kind().builtin() {
                    Some(builtin) => derive_value_rules(
                        &target,
                        &TypeId::builtin(builtin),
                        &scope,
                        ctx.options,
                    )?,
                    None => Vec::new(),
                };
                Slot {
                    index,
                    type_id: TypeId::any(),
                    deferred: true,
                    rules,
                }
            }
        };
        slots.push(slot);
    }

    let shape = PlanKind::Tuple(TuplePlan { slots });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, discovered)))
}
