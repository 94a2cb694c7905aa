use std::sync::Arc;

use schemaforge_core::{AdditionalProperties, Schema, TypeId};

use super::{Outcome, PlanContext, Planner};
use crate::errors::Result;
use crate::model::{MapPlan, Plan, PlanKind};
use crate::rules::derive_object_rules;

/// String-keyed map: no declared properties and an `additionalProperties`
/// schema or `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapPlanner;

impl Planner for MapPlanner {
    fn name(&self) -> &'static str {
        "map"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_map(ctx, schema).into()
    }
}

fn plan_map(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if !schema.properties.is_empty() {
        return Ok(None);
    }

    let (value, value_rules, discovered) = match &schema.additional_properties {
        Some(AdditionalProperties::Schema(value)) => {
            let resolved = ctx.value(value, &ctx.scope("Value"))?;
            (
                resolved.type_id,
                resolved.rules,
                resolved.node.into_iter().collect::<Vec<_>>(),
            )
        }
        Some(AdditionalProperties::Allowed(true)) => (TypeId::any(), Vec::new(), Vec::new()),
        _ => return Ok(None),
    };

    let shape = PlanKind::Map(MapPlan {
        value,
        value_rules,
        rules: derive_object_rules(schema, ctx.options),
    });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, discovered)))
}
