use std::collections::BTreeSet;
use std::sync::Arc;

use schemaforge_core::{AdditionalProperties, PrimitiveKind, Schema, TypeId};

use super::{Outcome, PlanContext, Planner};
use crate::errors::Result;
use crate::model::{AdditionalValues, Field, Plan, PlanKind, RecordPlan};

/// Plain record: effective kind object, one field per property.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordPlanner;

impl Planner for RecordPlanner {
    fn name(&self) -> &'static str {
        "record"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_record(ctx, schema).into()
    }
}

fn plan_record(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.effective_kind() != PrimitiveKind::Object {
        return Ok(None);
    }

    let mut fields = FieldSet::default();
    fields.add_properties(ctx, schema)?;
    let additional = promoted_additional(ctx, schema, &mut fields)?;

    Ok(Some(fields.into_plan(ctx, schema, additional)))
}

/// Fields of a record under construction. The first field with a given
/// name wins.
#[derive(Debug, Default)]
pub(super) struct FieldSet {
    fields: Vec<Field>,
    names: BTreeSet<String>,
    discovered: Vec<Arc<Schema>>,
}

impl FieldSet {
    pub(super) fn push(&mut self, field: Field, node: Option<Arc<Schema>>) {
        if self.names.insert(field.name.clone()) {
            self.fields.push(field);
            self.discovered.extend(node);
        }
    }

    /// Add one field per declared property of `owner`, in name order.
    pub(super) fn add_properties(&mut self, ctx: &PlanContext<'_>, owner: &Schema) -> Result<()> {
        for (property, schema) in &owner.properties {
            let name = ctx.field_name(owner, property)?;
            let value = ctx.value(schema, &ctx.scope(&name))?;
            let field = Field {
                name,
                json_name: property.clone(),
                type_id: value.type_id,
                required: owner.is_required(property),
                nullable: value.nullable,
                embedded: false,
                description: value.description,
                rules: value.rules,
            };
            self.push(field, value.node);
        }
        Ok(())
    }

    pub(super) fn discover(&mut self, node: Option<Arc<Schema>>) {
        self.discovered.extend(node);
    }

    pub(super) fn into_plan(
        self,
        ctx: &PlanContext<'_>,
        schema: &Schema,
        additional: Option<AdditionalValues>,
    ) -> Plan {
        let shape = PlanKind::Record(RecordPlan {
            fields: self.fields,
            additional,
        });
        Plan::new(ctx.type_id.clone(), schema, shape, self.discovered)
    }
}

/// Map of extra properties when promotion is enabled.
pub(super) fn promoted_additional(
    ctx: &PlanContext<'_>,
    schema: &Schema,
    fields: &mut FieldSet,
) -> Result<Option<AdditionalValues>> {
    if !ctx.options.promote_additional_properties || schema.properties.is_empty() {
        return Ok(None);
    }

    match &schema.additional_properties {
        Some(AdditionalProperties::Schema(value)) => {
            let resolved = ctx.value(value, &ctx.scope("AdditionalValue"))?;
            fields.discover(resolved.node);
            Ok(Some(AdditionalValues {
                value: resolved.type_id,
                rules: resolved.rules,
            }))
        }
        Some(AdditionalProperties::Allowed(true)) => Ok(Some(AdditionalValues {
            value: TypeId::any(),
            rules: Vec::new(),
        })),
        _ => Ok(None),
    }
}
