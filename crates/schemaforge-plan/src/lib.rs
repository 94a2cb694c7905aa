//! Type planning for schemaforge.
//!
//! The [`Typer`] assigns output type identities, the rule deriver turns
//! constraint keywords into validation rules and the [`StrategyChain`]
//! classifies each schema node into a [`Plan`].

pub mod errors;
pub mod group;
pub mod model;
pub mod options;
pub mod planner;
pub mod rules;
pub mod schema;
pub mod typer;

pub use errors::{PlanError, Result};
pub use group::{group_by_module, ModuleGroup};
pub use model::{
    AdditionalValues, DiscriminatedUnionPlan, EnumMember, EnumPlan, Field, ListPlan, MapPlan, Plan,
    PlanKind, RecordPlan, Rule, RuleInit, RuleName, Slot, TaggedUnionPlan, TuplePlan, UnionMember,
};
pub use options::PlanOptions;
pub use planner::{Outcome, PlanContext, Planner, StrategyChain};
pub use rules::{derive_list_rules, derive_object_rules, derive_value_rules, enum_rule, subschema_rule};
pub use schema::plan_json_schema;
pub use typer::Typer;
