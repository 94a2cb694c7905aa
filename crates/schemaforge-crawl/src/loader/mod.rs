//! Schema document loading.
//!
//! A [`Loader`] turns a URI into the schema node it identifies and keeps
//! every loaded node available through [`Resolver`]. Loading a document
//! also loads every document it references, so later reference lookups
//! never need to fetch.

mod file;
mod memory;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use schemaforge_core::{
    decode_document, document_part, normalize_id, validate_document, Document, Resolver, Schema,
    SchemaStore,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use url::Url;

pub use file::FileSource;
pub use memory::MemorySource;

/// Errors produced while fetching or decoding documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error reading {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {uri}: {source}")]
    Json {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported uri: {0}")]
    UnsupportedScheme(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Schema(#[from] schemaforge_core::Error),
}

/// Resolves URIs to schema nodes; repeat loads do not refetch.
#[async_trait]
pub trait Loader: Resolver {
    /// Load the node identified by `uri` along with every document it
    /// references, transitively.
    async fn load(&self, uri: &str) -> Result<Arc<Schema>, LoadError>;
}

/// Where raw documents come from.
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError>;
}

/// Caching loader over a [`Source`].
///
/// Each document is fetched at most once, even when several loads ask for
/// it concurrently.
pub struct DocumentLoader<S> {
    source: S,
    store: SchemaStore,
    documents: Mutex<HashMap<String, Arc<OnceCell<Arc<Document>>>>>,
}

/// Loads documents from the local filesystem.
pub type FileLoader = DocumentLoader<FileSource>;

/// Serves documents held in memory.
pub type MemoryLoader = DocumentLoader<MemorySource>;

impl<S: Source> DocumentLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            store: SchemaStore::new(),
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of indexed nodes across all loaded documents.
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    async fn document(&self, uri: &str) -> Result<Arc<Document>, LoadError> {
        let cell = {
            let mut documents = self.documents.lock().await;
            Arc::clone(documents.entry(uri.to_string()).or_default())
        };

        let document = cell
            .get_or_try_init(|| async {
                let value = self.source.fetch(uri).await?;
                let document = decode_document(uri, &value)?;
                validate_document(&document)?;
                self.store.insert_document(&document)?;
                debug!(
                    uri,
                    nodes = document.nodes.len(),
                    external_refs = document.external_refs.len(),
                    "document loaded"
                );
                Ok::<_, LoadError>(Arc::new(document))
            })
            .await?;

        Ok(Arc::clone(document))
    }
}

impl<S: Source> Resolver for DocumentLoader<S> {
    fn resolve(&self, uri: &str) -> Option<Arc<Schema>> {
        self.store.resolve(uri)
    }
}

#[async_trait]
impl<S: Source> Loader for DocumentLoader<S> {
    async fn load(&self, uri: &str) -> Result<Arc<Schema>, LoadError> {
        let uri = to_uri(uri)?;

        let mut visited = HashSet::new();
        let mut pending = vec![document_part(&uri).to_string()];
        while let Some(document_uri) = pending.pop() {
            if !visited.insert(document_uri.clone()) {
                continue;
            }
            let document = self.document(&document_uri).await?;
            pending.extend(document.external_refs.iter().cloned());
        }

        self.store
            .resolve(&uri)
            .ok_or_else(|| LoadError::NotFound(uri.clone()))
    }
}

/// Absolute URI for a root given as a URI or a filesystem path.
pub fn to_uri(input: &str) -> Result<String, LoadError> {
    if let Ok(url) = Url::parse(input) {
        return Ok(normalize_id(url.as_str()));
    }

    let path = std::path::absolute(input).map_err(|source| LoadError::Io {
        uri: input.to_string(),
        source,
    })?;
    Url::from_file_path(&path)
        .map(|url| normalize_id(url.as_str()))
        .map_err(|_| LoadError::UnsupportedScheme(input.to_string()))
}
