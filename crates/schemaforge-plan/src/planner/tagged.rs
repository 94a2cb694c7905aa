use std::collections::BTreeSet;
use std::sync::Arc;

use schemaforge_core::{PrimitiveKind, Schema};
use tracing::debug;

use super::{Outcome, PlanContext, Planner};
use crate::errors::Result;
use crate::model::{Plan, PlanKind, TaggedUnionPlan, UnionMember};

/// `oneOf` whose members have pairwise distinct primitive kinds.
///
/// Integer and number count as one kind. Repeated or unknown kinds make
/// the strategy step aside.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedUnionPlanner;

impl Planner for TaggedUnionPlanner {
    fn name(&self) -> &'static str {
        "tagged_union"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_tagged_union(ctx, schema).into()
    }
}

fn plan_tagged_union(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.one_of.is_empty() {
        return Ok(None);
    }

    let mut kinds = BTreeSet::new();
    let mut members = Vec::with_capacity(schema.one_of.len());
    let mut discovered = Vec::new();
    let mut nullable = false;

    for member in &schema.one_of {
        let target = ctx.typer.dereference(member)?;
        let kind = target.effective_kind();
        match kind {
            PrimitiveKind::Unknown => return Ok(None),
            PrimitiveKind::Null if !nullable => {
                nullable = true;
                continue;
            }
            _ => {}
        }
        if !kinds.insert(kind.union_class()) {
            debug!(schema = %schema.id, kind = %kind, "oneOf repeats a member kind");
            return Ok(None);
        }
        let Some(type_id) = ctx.typer.resolve(member, None)? else {
            return Ok(None);
        };
        discovered.extend(ctx.discover(member, &type_id)?);
        members.push(UnionMember { kind, type_id });
    }

    if members.is_empty() {
        return Ok(None);
    }

    let shape = PlanKind::TaggedUnion(TaggedUnionPlan { members, nullable });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, discovered)))
}
