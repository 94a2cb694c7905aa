use std::collections::BTreeSet;
use std::sync::Arc;

use schemaforge_core::{PrimitiveKind, Schema};

use super::record::{promoted_additional, FieldSet};
use super::{Outcome, PlanContext, Planner};
use crate::errors::Result;
use crate::model::{Field, Plan};
use crate::rules::subschema_rule;
use crate::typer::Typer;

/// Record composed from `allOf` branches whose combined kind is object.
///
/// Named branches are embedded; anonymous branches have their fields
/// inlined, recursively through nested `allOf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllOfPlanner;

impl Planner for AllOfPlanner {
    fn name(&self) -> &'static str {
        "all_of"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_all_of(ctx, schema).into()
    }
}

fn plan_all_of(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.all_of.is_empty() {
        return Ok(None);
    }
    let combined = combined_kind(ctx.typer, schema, &mut BTreeSet::new())?;
    if combined != Some(PrimitiveKind::Object) {
        return Ok(None);
    }

    let mut fields = FieldSet::default();
    fields.add_properties(ctx, schema)?;
    let mut inlined = BTreeSet::from([schema.id.clone()]);
    add_branches(ctx, schema, &mut fields, &mut inlined)?;
    let additional = promoted_additional(ctx, schema, &mut fields)?;

    Ok(Some(fields.into_plan(ctx, schema, additional)))
}

fn add_branches(
    ctx: &PlanContext<'_>,
    schema: &Schema,
    fields: &mut FieldSet,
    inlined: &mut BTreeSet<String>,
) -> Result<()> {
    for branch in &schema.all_of {
        let target = ctx.typer.dereference(branch)?;
        match ctx.typer.resolve(branch, None)? {
            Some(ty) if ty.is_named() => {
                let rules = if ctx.options.validates(&target) {
                    vec![subschema_rule(&ty)]
                } else {
                    Vec::new()
                };
                let node = ctx.discover(branch, &ty)?;
                let field = Field {
                    name: ty.name().to_string(),
                    json_name: String::new(),
                    type_id: ty,
                    required: true,
                    nullable: false,
                    embedded: true,
                    description: target.description.clone(),
                    rules,
                };
                fields.push(field, node);
            }
            _ => {
                if !inlined.insert(target.id.clone()) {
                    continue;
                }
                fields.add_properties(ctx, &target)?;
                add_branches(ctx, &target, fields, inlined)?;
            }
        }
    }
    Ok(())
}

/// Kind shared by a schema and all of its `allOf` branches.
///
/// `Unknown` means no branch declares a kind; `None` means they conflict.
fn combined_kind(
    typer: &Typer,
    schema: &Schema,
    visited: &mut BTreeSet<String>,
) -> Result<Option<PrimitiveKind>> {
    if !visited.insert(schema.id.clone()) {
        return Ok(Some(PrimitiveKind::Unknown));
    }

    let mut combined = schema.effective_kind();
    for branch in &schema.all_of {
        let target = typer.dereference(branch)?;
        let kind = match target.effective_kind() {
            PrimitiveKind::Unknown if !target.all_of.is_empty() => {
                match combined_kind(typer, &target, visited)? {
                    Some(kind) => kind,
                    None => return Ok(None),
                }
            }
            kind => kind,
        };
        combined = match (combined, kind) {
            (PrimitiveKind::Unknown, kind) | (kind, PrimitiveKind::Unknown) => kind,
            (left, right) if left == right => left,
            _ => return Ok(None),
        };
    }
    Ok(Some(combined))
}
