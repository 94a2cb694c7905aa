//! `schemaforge.toml` loading and flag overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use schemaforge_core::Naming;
use schemaforge_crawl::CrawlOptions;
use schemaforge_plan::PlanOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "schemaforge.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub naming: Naming,
    pub types: TypesConfig,
    /// Schema identities that are never planned.
    pub exclude: Vec<String>,
    pub promote_additional_properties: Option<bool>,
    pub validate: Option<bool>,
    pub max_concurrency: Option<usize>,
    pub include_definitions: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypesConfig {
    /// Schema identity to `module.Name` or built-in type name.
    pub overrides: BTreeMap<String, String>,
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub exclude: Vec<String>,
    pub no_validate: bool,
    pub promote_additional_properties: bool,
    pub include_definitions: bool,
    pub max_concurrency: Option<usize>,
}

/// Effective options for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub plan: PlanOptions,
    pub crawl: CrawlOptions,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit`, or `schemaforge.toml` in the working directory
    /// when present.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };
        match path {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: &Overrides) -> Self {
        let defaults = PlanOptions::default();
        let plan = PlanOptions {
            validate: !overrides.no_validate && file.validate.unwrap_or(defaults.validate),
            promote_additional_properties: overrides.promote_additional_properties
                || file
                    .promote_additional_properties
                    .unwrap_or(defaults.promote_additional_properties),
            exclude: file
                .exclude
                .into_iter()
                .chain(overrides.exclude.iter().cloned())
                .collect(),
            type_overrides: file.types.overrides,
            naming: file.naming,
        };

        let mut crawl = CrawlOptions::default();
        if let Some(max) = overrides.max_concurrency.or(file.max_concurrency) {
            crawl.max_concurrency = max.max(1);
        }
        crawl.include_definitions =
            overrides.include_definitions || file.include_definitions.unwrap_or(false);

        Self { plan, crawl }
    }
}
