use std::collections::BTreeSet;
use std::sync::Arc;

use schemaforge_core::{value_kind, PrimitiveKind, Schema};
use serde_json::Value;

use super::{Outcome, PlanContext, Planner};
use crate::errors::{PlanError, Result};
use crate::model::{EnumMember, EnumPlan, Plan, PlanKind};
use crate::rules::enum_rule;

/// Closed set of literal values of one base kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumPlanner;

impl Planner for EnumPlanner {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome {
        plan_enum(ctx, schema).into()
    }
}

fn plan_enum(ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Result<Option<Plan>> {
    if schema.enum_values.is_empty() {
        return Ok(None);
    }

    let nullable = schema.enum_values.iter().any(Value::is_null) || schema.nullable;
    let values: Vec<Value> = schema
        .enum_values
        .iter()
        .filter(|value| !value.is_null())
        .cloned()
        .collect();

    let kind = base_kind(schema, &values)?;
    let base = kind.builtin().ok_or_else(|| {
        PlanError::invalid(&schema.id, format!("enum of {kind} values is not supported"))
    })?;

    let type_name = ctx.type_id.name();
    let mut taken = BTreeSet::new();
    let members = values
        .iter()
        .map(|value| EnumMember {
            name: member_name(ctx, type_name, value, &mut taken),
            value: value.clone(),
        })
        .collect();

    let rules = if ctx.options.validates(schema) {
        vec![enum_rule(&values)]
    } else {
        Vec::new()
    };

    let shape = PlanKind::Enum(EnumPlan {
        base,
        members,
        nullable,
        rules,
    });
    Ok(Some(Plan::new(ctx.type_id.clone(), schema, shape, Vec::new())))
}

/// Declared kind reconciled with the kinds of the member values.
fn base_kind(schema: &Schema, values: &[Value]) -> Result<PrimitiveKind> {
    let declared = match schema.kind {
        PrimitiveKind::Unknown | PrimitiveKind::Null => None,
        kind => Some(kind),
    };

    let mut kinds = values.iter().map(value_kind);
    let mut combined = match (declared, kinds.next()) {
        (Some(kind), _) => kind,
        (None, Some(kind)) => kind,
        (None, None) => {
            return Err(PlanError::invalid(&schema.id, "enum has no non-null members"));
        }
    };

    for kind in values.iter().map(value_kind) {
        combined = match (combined, kind) {
            (left, right) if left == right => left,
            (PrimitiveKind::Number, PrimitiveKind::Integer) => PrimitiveKind::Number,
            (PrimitiveKind::Integer, PrimitiveKind::Number) if declared.is_none() => {
                PrimitiveKind::Number
            }
            _ => return Err(PlanError::MixedEnum(schema.id.clone())),
        };
    }
    Ok(combined)
}

/// `<Type><Value>`, made unique with a numeric suffix.
fn member_name(
    ctx: &PlanContext<'_>,
    type_name: &str,
    value: &Value,
    taken: &mut BTreeSet<String>,
) -> String {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string().replace('-', "Neg").replace('.', "_"),
    };
    let naming = ctx.typer.naming();
    let base = naming
        .exported(&format!("{type_name}_{text}"))
        .filter(|name| name != type_name)
        .unwrap_or_else(|| format!("{type_name}Value"));

    let mut name = base.clone();
    let mut suffix = 2;
    while !taken.insert(name.clone()) {
        name = format!("{base}{suffix}");
        suffix += 1;
    }
    name
}
