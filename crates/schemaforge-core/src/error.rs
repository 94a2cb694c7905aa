use thiserror::Error;

/// Core error type shared across schemaforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema document violates structural invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A keyword or form outside the supported dialect.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A `$ref` target that no loaded document defines.
    #[error("unresolved reference: {0}")]
    DanglingReference(String),
    /// A document URI or reference that cannot be parsed or joined.
    #[error("invalid uri '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

/// Convenience alias for results returned by schemaforge crates.
pub type Result<T> = std::result::Result<T, Error>;
