mod logging;
mod run;

pub use logging::init_run_logging;
pub use run::{start_run, write_graph, write_plans, RunContext, RunOptions, RunPaths};

use std::path::PathBuf;

use thiserror::Error;

/// Failures recording a run: its config, log file, plans and graph.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A plan or graph file could not be opened for writing.
    #[error("cannot write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
