use std::sync::Arc;

use schemaforge_core::{Items, PrimitiveKind, Schema, TypeId};

use super::{Outcome, PlanContext, Planner};
use crate::errors::{PlanError, Result};
use crate::model::{ListPlan, Plan, PlanKind};
use crate::rules::{derive_list_rules, derive_value_rules};

/// Homogeneous sequence: array with a single `items` schema or none.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPlanner;

impl Planner for ListPlanner {
    fn name(&self) -> &'static str {
        "list"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_list(ctx, schema).into()
    }
}

fn plan_list(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.effective_kind() != PrimitiveKind::Array {
        return Ok(None);
    }

    let mut discovered = Vec::new();
    let (element, element_rules) = match &schema.items {
        Some(Items::Single(item)) => {
            let target = ctx.typer.dereference(item)?;
            match ctx.typer.resolve(item, None)? {
                Some(element) => {
                    discovered.extend(ctx.discover(item, &element)?);
                    let rules =
                        derive_value_rules(&target, &element, &ctx.scope("Item"), ctx.options)?;
                    (element, rules)
                }
                None if has_shape(&target) => {
                    return Err(PlanError::invalid(
                        &schema.id,
                        "list element has no stable type identity",
                    ));
                }
                None => (TypeId::any(), Vec::new()),
            }
        }
        Some(Items::Tuple(_)) => return Ok(None),
        None => (TypeId::any(), Vec::new()),
    };

    let rules = derive_list_rules(schema, &element, ctx.options)?;
    let shape = PlanKind::List(ListPlan {
        element,
        element_rules,
        rules,
    });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, discovered)))
}

fn has_shape(schema: &Schema) -> bool {
    matches!(
        schema.effective_kind(),
        PrimitiveKind::Object | PrimitiveKind::Array
    ) || !schema.all_of.is_empty()
        || !schema.one_of.is_empty()
}
