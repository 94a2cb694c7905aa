//! Ordered strategy chain classifying one schema node into a plan.

mod allof;
mod discriminated;
mod enumeration;
mod list;
mod map;
mod record;
mod tagged;
mod tuple;

use std::sync::Arc;

use schemaforge_core::{PrimitiveKind, Schema, TypeId};
use tracing::debug;

use crate::errors::{PlanError, Result};
use crate::model::{Plan, Rule};
use crate::options::PlanOptions;
use crate::rules::derive_value_rules;
use crate::typer::Typer;

pub use allof::AllOfPlanner;
pub use discriminated::DiscriminatedUnionPlanner;
pub use enumeration::EnumPlanner;
pub use list::ListPlanner;
pub use map::MapPlanner;
pub use record::RecordPlanner;
pub use tagged::TaggedUnionPlanner;
pub use tuple::TuplePlanner;

/// Result of one strategy.
#[derive(Debug)]
pub enum Outcome {
    Matched(Plan),
    /// The strategy does not apply; try the next one.
    Continue,
    /// Abort the run.
    Fatal(PlanError),
}

impl From<Result<Option<Plan>>> for Outcome {
    fn from(result: Result<Option<Plan>>) -> Self {
        match result {
            Ok(Some(plan)) => Self::Matched(plan),
            Ok(None) => Self::Continue,
            Err(err) => Self::Fatal(err),
        }
    }
}

/// One classifier of the chain.
pub trait Planner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Classify a dereferenced schema node.
    fn plan(&self, ctx: &PlanContext<'_>, schema: &Arc<Schema>) -> Outcome;
}

/// State shared by the strategies while planning one node.
#[derive(Debug)]
pub struct PlanContext<'a> {
    pub typer: &'a Typer,
    pub options: &'a PlanOptions,
    /// Identity of the node being planned.
    pub type_id: TypeId,
}

/// Resolved type of a property, element or map value.
#[derive(Debug)]
pub(crate) struct ResolvedValue {
    pub type_id: TypeId,
    pub nullable: bool,
    pub rules: Vec<Rule>,
    pub description: Option<String>,
    /// Node to plan separately when the type is a generated named type.
    pub node: Option<Arc<Schema>>,
}

impl PlanContext<'_> {
    /// Resolve the value type of `schema`, unknown types becoming `any`.
    ///
    /// A two-branch `oneOf` with a `null` branch collapses to the other
    /// branch, made optional.
    pub(crate) fn value(&self, schema: &Arc<Schema>, scope: &str) -> Result<ResolvedValue> {
        let (branch, collapsed) = match self.nullable_branch(schema)? {
            Some(branch) => (branch, true),
            None => (Arc::clone(schema), false),
        };
        let target = self.typer.dereference(&branch)?;
        let type_id = self
            .typer
            .resolve(&branch, None)?
            .unwrap_or_else(TypeId::any);
        let type_id = if collapsed {
            type_id.into_optional()
        } else {
            type_id
        };

        let rules = derive_value_rules(&target, &type_id, scope, self.options)?;
        let node = self.discover(&branch, &type_id)?;
        let description = schema
            .description
            .clone()
            .or_else(|| target.description.clone());

        Ok(ResolvedValue {
            type_id,
            nullable: collapsed || target.nullable,
            rules,
            description,
            node,
        })
    }

    /// The node behind `type_id` when it still needs a plan of its own.
    pub(crate) fn discover(
        &self,
        schema: &Arc<Schema>,
        type_id: &TypeId,
    ) -> Result<Option<Arc<Schema>>> {
        if !type_id.is_named() || self.typer.is_explicit(schema)? {
            return Ok(None);
        }
        Ok(Some(Arc::clone(schema)))
    }

    /// Exported name for a property of `owner`.
    pub(crate) fn field_name(&self, owner: &Schema, property: &str) -> Result<String> {
        self.typer.naming().exported(property).ok_or_else(|| {
            PlanError::invalid(
                &owner.id,
                format!("property '{property}' has no usable identifier"),
            )
        })
    }

    /// Initializer scope for values nested under the planned type.
    pub(crate) fn scope(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.type_id.name())
    }

    fn nullable_branch(&self, schema: &Arc<Schema>) -> Result<Option<Arc<Schema>>> {
        let target = self.typer.dereference(schema)?;
        if target.one_of.len() != 2 {
            return Ok(None);
        }

        let mut nulls = 0;
        let mut other = None;
        for branch in &target.one_of {
            if self.typer.dereference(branch)?.kind == PrimitiveKind::Null {
                nulls += 1;
            } else {
                other = Some(Arc::clone(branch));
            }
        }
        Ok(if nulls == 1 { other } else { None })
    }
}

/// Ordered list of strategies; the first match wins.
pub struct StrategyChain {
    strategies: Vec<Box<dyn Planner>>,
    options: PlanOptions,
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChain")
            .field("strategies", &self.strategy_names())
            .field("options", &self.options)
            .finish()
    }
}

impl StrategyChain {
    pub fn new(options: PlanOptions, strategies: Vec<Box<dyn Planner>>) -> Self {
        Self {
            strategies,
            options,
        }
    }

    /// Map, all-of record, record, tuple, list, discriminated union,
    /// tagged union, enumeration.
    pub fn standard(options: PlanOptions) -> Self {
        Self::new(
            options,
            vec![
                Box::new(MapPlanner),
                Box::new(AllOfPlanner),
                Box::new(RecordPlanner),
                Box::new(TuplePlanner),
                Box::new(ListPlanner),
                Box::new(DiscriminatedUnionPlanner),
                Box::new(TaggedUnionPlanner),
                Box::new(EnumPlanner),
            ],
        )
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Classify `schema`. Fails with [`PlanError::Unplannable`] when no
    /// strategy matches.
    pub fn plan(&self, typer: &Typer, schema: &Arc<Schema>) -> Result<Plan> {
        let target = typer.dereference(schema)?;
        let type_id = match typer.resolve(schema, None)? {
            Some(type_id) if type_id.is_named() => type_id,
            _ => return Err(PlanError::Unplannable(target.id.clone())),
        };

        let ctx = PlanContext {
            typer,
            options: &self.options,
            type_id,
        };

        for strategy in &self.strategies {
            match strategy.plan(&ctx, &target) {
                Outcome::Matched(plan) => {
                    debug!(
                        schema = %target.id,
                        type_id = %plan.type_id,
                        strategy = strategy.name(),
                        "schema classified"
                    );
                    return Ok(plan);
                }
                Outcome::Continue => continue,
                Outcome::Fatal(err) => return Err(err),
            }
        }

        Err(PlanError::Unplannable(target.id.clone()))
    }
}
