use std::collections::BTreeMap;
use std::sync::Arc;

use schemaforge_core::{Error as SchemaError, Schema};
use serde_json::Value;

use super::{Outcome, PlanContext, Planner};
use crate::errors::{PlanError, Result};
use crate::model::{DiscriminatedUnionPlan, Plan, PlanKind};
use crate::rules::enum_rule;

/// Union selected by a discriminator property.
///
/// The value mapping comes from configuration, or from the constant value
/// each `oneOf` member fixes for the discriminator property.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscriminatedUnionPlanner;

impl Planner for DiscriminatedUnionPlanner {
    fn name(&self) -> &'static str {
        "discriminated_union"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_discriminated_union(ctx, schema).into()
    }
}

fn plan_discriminated_union(
    ctx: &PlanContext<'_>,
    schema: &Arc<Schema>,
) -> Result<Option<Plan>> {
    let Some(discriminator) = &schema.extension.discriminator else {
        return Ok(None);
    };
    let field = ctx.field_name(schema, &discriminator.property)?;

    let mut members: BTreeMap<String, Arc<Schema>> = BTreeMap::new();
    if !discriminator.mapping.is_empty() {
        for (value, uri) in &discriminator.mapping {
            let node = ctx
                .typer
                .resolver()
                .resolve(uri)
                .ok_or_else(|| SchemaError::DanglingReference(uri.clone()))?;
            members.insert(value.clone(), node);
        }
    } else {
        if schema.one_of.is_empty() {
            return Err(PlanError::invalid(
                &schema.id,
                "discriminator has neither a mapping nor oneOf members",
            ));
        }
        for member in &schema.one_of {
            let target = ctx.typer.dereference(member)?;
            let value = fixed_value(ctx, &target, &discriminator.property)?.ok_or_else(|| {
                PlanError::invalid(
                    &target.id,
                    format!(
                        "member does not fix discriminator property '{}'",
                        discriminator.property
                    ),
                )
            })?;
            if members.insert(value.clone(), Arc::clone(member)).is_some() {
                return Err(PlanError::invalid(
                    &schema.id,
                    format!("discriminator value '{value}' maps to more than one member"),
                ));
            }
        }
    }

    let mut mapping = BTreeMap::new();
    let mut discovered = Vec::new();
    for (value, node) in &members {
        let type_id = match ctx.typer.resolve(node, None)? {
            Some(type_id) if type_id.is_named() => type_id,
            _ => {
                return Err(PlanError::invalid(
                    &node.id,
                    format!("member for discriminator value '{value}' has no named type"),
                ));
            }
        };
        discovered.extend(ctx.discover(node, &type_id)?);
        mapping.insert(value.clone(), type_id);
    }

    let rules = if ctx.options.validates(schema) {
        let values: Vec<Value> = mapping.keys().cloned().map(Value::String).collect();
        vec![enum_rule(&values)]
    } else {
        Vec::new()
    };

    let shape = PlanKind::DiscriminatedUnion(DiscriminatedUnionPlan {
        property: discriminator.property.clone(),
        field,
        mapping,
        rules,
    });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, discovered)))
}

/// String constant a member declares for `property` via `const` or a
/// single-valued `enum`.
fn fixed_value(ctx: &PlanContext<'_>, member: &Schema, property: &str) -> Result<Option<String>> {
    let Some(node) = member.properties.get(property) else {
        return Ok(None);
    };
    let target = ctx.typer.dereference(node)?;
    Ok(match target.enum_values.as_slice() {
        [Value::String(value)] => Some(value.clone()),
        _ => None,
    })
}
