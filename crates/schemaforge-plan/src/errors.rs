use thiserror::Error;

/// Fatal planning errors. Any one of them aborts the whole run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Schema(#[from] schemaforge_core::Error),
    #[error("invalid schema {schema}: {reason}")]
    InvalidSchema { schema: String, reason: String },
    #[error("no strategy can plan schema {0}")]
    Unplannable(String),
    #[error("uniqueItems on {schema} requires a comparable element type, found {element}")]
    NonComparable { schema: String, element: String },
    #[error("invalid pattern '{pattern}' in {schema}: {source}")]
    InvalidPattern {
        schema: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("enum members of {0} do not share one primitive kind")]
    MixedEnum(String),
}

impl PlanError {
    pub(crate) fn invalid(schema: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            schema: schema.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
