use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use schemaforge_core::{BuiltinKind, PrimitiveKind, Schema, TypeId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finished classification of one schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Output type produced by this plan.
    pub type_id: TypeId,
    /// Identity of the schema node the plan was derived from.
    pub schema_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Kind-specific structure.
    pub shape: PlanKind,
    /// Named types referenced by the shape or its rules, sorted.
    pub dependencies: Vec<TypeId>,
    /// Schema nodes behind named dependencies, handed back to the crawler.
    #[serde(skip)]
    pub discovered: Vec<Arc<Schema>>,
}

impl Plan {
    /// Build a plan; dependencies are collected from the shape.
    pub fn new(
        type_id: TypeId,
        schema: &Schema,
        shape: PlanKind,
        discovered: Vec<Arc<Schema>>,
    ) -> Self {
        let mut dependencies = BTreeSet::new();
        shape.collect_dependencies(&mut dependencies);
        dependencies.remove(&type_id);

        Self {
            type_id,
            schema_id: schema.id.clone(),
            description: schema.description.clone(),
            shape,
            dependencies: dependencies.into_iter().collect(),
            discovered,
        }
    }

    /// Module portion of the plan's own type.
    pub fn module(&self) -> Option<&str> {
        self.type_id.module()
    }
}

/// Plan body, one variant per strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanKind {
    Map(MapPlan),
    Record(RecordPlan),
    Tuple(TuplePlan),
    List(ListPlan),
    DiscriminatedUnion(DiscriminatedUnionPlan),
    TaggedUnion(TaggedUnionPlan),
    Enum(EnumPlan),
}

impl PlanKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Map(_) => "map",
            Self::Record(_) => "record",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::DiscriminatedUnion(_) => "discriminated_union",
            Self::TaggedUnion(_) => "tagged_union",
            Self::Enum(_) => "enum",
        }
    }

    fn collect_dependencies(&self, out: &mut BTreeSet<TypeId>) {
        let mut add = |ty: &TypeId| {
            if ty.is_named() {
                out.insert(ty.clone());
            }
        };

        match self {
            Self::Map(map) => {
                add(&map.value);
                rule_dependencies(&map.value_rules, &mut add);
                rule_dependencies(&map.rules, &mut add);
            }
            Self::Record(record) => {
                for field in &record.fields {
                    add(&field.type_id);
                    rule_dependencies(&field.rules, &mut add);
                }
                if let Some(additional) = &record.additional {
                    add(&additional.value);
                    rule_dependencies(&additional.rules, &mut add);
                }
            }
            Self::Tuple(tuple) => {
                for slot in &tuple.slots {
                    add(&slot.type_id);
                    rule_dependencies(&slot.rules, &mut add);
                }
            }
            Self::List(list) => {
                add(&list.element);
                rule_dependencies(&list.element_rules, &mut add);
                rule_dependencies(&list.rules, &mut add);
            }
            Self::DiscriminatedUnion(union) => {
                union.mapping.values().for_each(&mut add);
                rule_dependencies(&union.rules, &mut add);
            }
            Self::TaggedUnion(union) => {
                for member in &union.members {
                    add(&member.type_id);
                }
            }
            Self::Enum(enumeration) => rule_dependencies(&enumeration.rules, &mut add),
        }
    }
}

fn rule_dependencies(rules: &[Rule], add: &mut impl FnMut(&TypeId)) {
    rules.iter().flat_map(|rule| &rule.dependencies).for_each(add);
}

/// String-keyed map of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MapPlan {
    pub value: TypeId,
    /// Rules applied to every value.
    pub value_rules: Vec<Rule>,
    /// Rules applied to the map itself.
    pub rules: Vec<Rule>,
}

/// Struct-like record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordPlan {
    pub fields: Vec<Field>,
    /// Extra properties collected into a map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<AdditionalValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    /// Exported field name.
    pub name: String,
    /// Property name on the wire; empty for embedded fields.
    pub json_name: String,
    pub type_id: TypeId,
    pub required: bool,
    /// Value may be `null`.
    pub nullable: bool,
    /// Field embeds a named type by reference.
    pub embedded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdditionalValues {
    pub value: TypeId,
    pub rules: Vec<Rule>,
}

/// Fixed-arity positional list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TuplePlan {
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Slot {
    pub index: usize,
    pub type_id: TypeId,
    /// The slot is open; its rules run after a type check on the value.
    pub deferred: bool,
    pub rules: Vec<Rule>,
}

/// Homogeneous sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ListPlan {
    pub element: TypeId,
    pub element_rules: Vec<Rule>,
    pub rules: Vec<Rule>,
}

/// Union selected by the value of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiscriminatedUnionPlan {
    /// Discriminator property on the wire.
    pub property: String,
    /// Exported name of the discriminator field.
    pub field: String,
    /// Discriminator value to member type.
    pub mapping: BTreeMap<String, TypeId>,
    /// Rejects unmapped discriminator values.
    pub rules: Vec<Rule>,
}

/// Union of members with pairwise distinct primitive kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaggedUnionPlan {
    pub members: Vec<UnionMember>,
    /// One of the alternatives is `null`.
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UnionMember {
    pub kind: PrimitiveKind,
    pub type_id: TypeId,
}

/// Closed set of literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnumPlan {
    pub base: BuiltinKind,
    pub members: Vec<EnumMember>,
    pub nullable: bool,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnumMember {
    /// Exported constant name.
    pub name: String,
    pub value: serde_json::Value,
}

/// Named validation rule.
///
/// Expressions reference the checked value through `{v}`. `test` evaluates
/// to true when the value violates the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub name: RuleName,
    /// One-time initialization, e.g. a compiled pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<RuleInit>,
    pub test: String,
    /// Expression producing the failure message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleInit {
    pub var: String,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RuleName {
    Enum,
    MaxItems,
    MaxLength,
    MaxProperties,
    Maximum,
    MinItems,
    MinLength,
    MinProperties,
    Minimum,
    MultipleOf,
    Pattern,
    Subschema,
    UniqueItems,
}

impl RuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enum => "enum",
            Self::MaxItems => "maxItems",
            Self::MaxLength => "maxLength",
            Self::MaxProperties => "maxProperties",
            Self::Maximum => "maximum",
            Self::MinItems => "minItems",
            Self::MinLength => "minLength",
            Self::MinProperties => "minProperties",
            Self::Minimum => "minimum",
            Self::MultipleOf => "multipleOf",
            Self::Pattern => "pattern",
            Self::Subschema => "subschema",
            Self::UniqueItems => "uniqueItems",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for RuleName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Rules order by their wire name.
impl Ord for RuleName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}
