mod config;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use config::{ConfigError, FileConfig, Overrides, Settings};
use registry::{init_run_logging, start_run, write_graph, write_plans, RunContext, RunOptions};
use schemaforge_core::build_dependency_report;
use schemaforge_crawl::{CrawlError, Crawler, FileLoader};
use schemaforge_plan::{group_by_module, plan_json_schema, PlanError, StrategyChain, Typer};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "schemaforge", version, about = "JSON Schema type planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl schemas from the given roots and write grouped plans.
    Generate(GenerateArgs),
    /// Print the JSON Schema of the plan output format.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Root schema files or URIs.
    #[arg(value_name = "ROOT", required = true)]
    roots: Vec<String>,
    /// Configuration file (defaults to ./schemaforge.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Also write plans/<module>.json files into this directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Schema identity to skip (repeatable).
    #[arg(long, value_name = "SCHEMA_ID")]
    exclude: Vec<String>,
    /// Do not emit validation rules.
    #[arg(long, default_value_t = false)]
    no_validate: bool,
    /// Keep additionalProperties alongside declared properties.
    #[arg(long, default_value_t = false)]
    promote_additional_properties: bool,
    /// Plan every definition of the root documents.
    #[arg(long, default_value_t = false)]
    include_definitions: bool,
    /// Maximum concurrent classifications.
    #[arg(long)]
    max_concurrency: Option<usize>,
    /// Fail when the type dependency graph has cycles.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Schema(args) => run_schema(args),
    }
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        roots,
        config,
        run_dir,
        out,
        exclude,
        no_validate,
        promote_additional_properties,
        include_definitions,
        max_concurrency,
        strict,
    } = args;

    if max_concurrency == Some(0) {
        return Err(CliError::InvalidConfig(
            "max concurrency must be at least 1".to_string(),
        ));
    }

    let (file, config_path) = FileConfig::discover(config.as_deref())?;
    let overrides = Overrides {
        exclude,
        no_validate,
        promote_additional_properties,
        include_definitions,
        max_concurrency,
    };
    let settings = Settings::resolve(file, &overrides);

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        roots: roots.clone(),
        strict,
        run_dir,
        out,
        config_path,
        plan: settings.plan.clone(),
        options: RunOptions {
            max_concurrency: settings.crawl.max_concurrency,
            include_definitions: settings.crawl.include_definitions,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, roots = roots.len());

    let timer = Instant::now();

    let loader = Arc::new(FileLoader::files());
    let typer = Typer::new(loader.clone(), &settings.plan)?;
    let chain = StrategyChain::standard(settings.plan.clone());
    tracing::info!(
        event = "crawl_started",
        strategies = ?chain.strategy_names(),
        max_concurrency = settings.crawl.max_concurrency
    );

    let crawler = Crawler::new(Arc::new(chain), loader, Arc::new(typer), settings.crawl);
    let plans = match crawler.collect(roots).await {
        Ok(plans) => plans,
        Err(err) => {
            tracing::error!(event = "run_finished", status = "failed", error = %err);
            return Err(err.into());
        }
    };

    tracing::info!(event = "crawl_finished", plans = plans.len());

    let report = build_dependency_report(
        plans
            .iter()
            .map(|plan| (&plan.type_id, plan.dependencies.as_slice())),
    );
    write_graph(&run_paths, &report)?;
    tracing::info!(
        event = "graph_written",
        nodes = report.summary.nodes,
        edges = report.summary.edges,
        has_cycle = report.cycle.is_some(),
        path = %run_paths.graph_path.display()
    );

    let groups = group_by_module(plans);
    let modules = write_plans(&run_paths, &groups, run_ctx.out.as_deref())?;
    tracing::info!(
        event = "plans_written",
        modules = modules,
        path = %run_paths.plans_dir.display()
    );

    if let (true, Some(cycle)) = (run_ctx.strict, &report.cycle) {
        return Err(CliError::InvalidConfig(format!(
            "type dependency graph contains cycles: {}",
            cycle.join(", ")
        )));
    }

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);
    println!("{}", run_paths.root.display());

    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = serde_json::to_string_pretty(&plan_json_schema())?;
    match args.out {
        Some(path) => std::fs::write(path, schema)?,
        None => println!("{schema}"),
    }
    Ok(())
}
