use std::collections::BTreeMap;
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use schemaforge_core::{DependencyReport, PLAN_FORMAT_VERSION};
use schemaforge_plan::{ModuleGroup, PlanOptions};

use super::{RegistryError, RegistryResult};

/// Crawl options recorded for a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub max_concurrency: usize,
    pub include_definitions: bool,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub roots: Vec<String>,
    pub strict: bool,
    pub run_dir: PathBuf,
    pub out: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub plan: PlanOptions,
    pub options: RunOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub plan_format_version: String,
    pub roots: Vec<String>,
    pub strict: bool,
    pub config_path: Option<String>,
    pub plan: PlanOptions,
    pub crawl: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub plans_dir: PathBuf,
    pub logs_path: PathBuf,
    pub graph_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));
    let plans_dir = root.join("plans");

    create_dir_all(&plans_dir)?;

    let config_path = root.join("config.json");
    let logs_path = root.join("logs.ndjson");
    let graph_path = root.join("graph.json");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        plan_format_version: PLAN_FORMAT_VERSION.to_string(),
        roots: ctx.roots.clone(),
        strict: ctx.strict,
        config_path: ctx
            .config_path
            .as_ref()
            .map(|path| path.display().to_string()),
        plan: ctx.plan.clone(),
        crawl: ctx.options.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        root,
        plans_dir,
        logs_path,
        graph_path,
    })
}

/// Write one `<module>.json` per group into the run, and into `out_dir`
/// when given. Returns the number of files per destination.
pub fn write_plans(
    paths: &RunPaths,
    groups: &BTreeMap<String, ModuleGroup>,
    out_dir: Option<&Path>,
) -> RegistryResult<usize> {
    let mut destinations = vec![paths.plans_dir.as_path()];
    if let Some(out_dir) = out_dir {
        create_dir_all(out_dir)?;
        destinations.push(out_dir);
    }

    for dir in destinations {
        for (module, group) in groups {
            write_json(&dir.join(format!("{module}.json")), group)?;
        }
    }

    Ok(groups.len())
}

pub fn write_graph(paths: &RunPaths, report: &DependencyReport) -> RegistryResult<()> {
    write_json(&paths.graph_path, report)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|source| RegistryError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{build_dependency_report, Schema, TypeId};
    use schemaforge_plan::{Plan, PlanKind, RecordPlan};

    fn context(run_dir: &Path) -> RunContext {
        RunContext {
            run_id: "3f1c".to_string(),
            started_at: DateTime::parse_from_rfc3339("2026-10-18T09:30:00Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            roots: vec!["schemas/order.json".to_string()],
            strict: false,
            run_dir: run_dir.to_path_buf(),
            out: None,
            config_path: None,
            plan: PlanOptions::default(),
            options: RunOptions {
                max_concurrency: 2,
                include_definitions: false,
            },
        }
    }

    #[test]
    fn start_run_lays_out_the_run_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = start_run(&context(dir.path())).expect("start run");

        assert_eq!(
            paths.root,
            dir.path().join("2026-10-18T09-30-00Z__run_3f1c")
        );
        assert!(paths.plans_dir.is_dir());
        assert!(paths.logs_path.is_file());

        let config: serde_json::Value = serde_json::from_slice(
            &std::fs::read(paths.root.join("config.json")).expect("read config"),
        )
        .expect("config json");
        assert_eq!(config["run_id"], "3f1c");
        assert_eq!(config["plan_format_version"], PLAN_FORMAT_VERSION);
        assert_eq!(config["crawl"]["max_concurrency"], 2);
        assert_eq!(config["plan"]["validate"], true);
    }

    #[test]
    fn plans_and_graph_are_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        let paths = start_run(&context(&dir.path().join("runs"))).expect("start run");

        let groups = schemaforge_plan::group_by_module(Vec::new());
        assert_eq!(write_plans(&paths, &groups, Some(&out)).expect("plans"), 0);
        assert!(out.is_dir());

        let order = TypeId::named("order", "Order");
        let line = TypeId::named("line", "Line");
        let deps = vec![line.clone()];
        let report = build_dependency_report([(&order, deps.as_slice()), (&line, &[][..])]);
        write_graph(&paths, &report).expect("graph");

        let graph: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.graph_path).expect("read graph"))
                .expect("graph json");
        assert_eq!(graph["summary"]["nodes"], 2);
        assert_eq!(graph["summary"]["edges"], 1);
    }

    #[test]
    fn unwritable_plan_file_names_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = start_run(&context(dir.path())).expect("start run");
        // A directory squatting on the module file blocks the write.
        std::fs::create_dir(paths.plans_dir.join("order.json")).expect("blocker");

        let schema = Schema {
            id: "file:///schemas/order.json".to_string(),
            ..Schema::default()
        };
        let shape = PlanKind::Record(RecordPlan {
            fields: Vec::new(),
            additional: None,
        });
        let plans = vec![Plan::new(
            TypeId::named("order", "Order"),
            &schema,
            shape,
            Vec::new(),
        )];
        let groups = schemaforge_plan::group_by_module(plans);
        let err = write_plans(&paths, &groups, None).expect_err("blocked plan file");

        match err {
            RegistryError::Artifact { path, .. } => {
                assert_eq!(path, paths.plans_dir.join("order.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
