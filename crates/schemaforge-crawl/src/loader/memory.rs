use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use schemaforge_core::normalize_id;
use serde_json::Value;

use super::{DocumentLoader, LoadError, Source};

/// Documents held in memory, keyed by absolute URI.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: HashMap<String, Value>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new<I, K>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            documents: documents
                .into_iter()
                .map(|(uri, value)| (normalize_id(&uri.into()), value))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(uri.to_string()))
    }
}

impl DocumentLoader<MemorySource> {
    /// Loader serving the given `(uri, document)` pairs.
    pub fn memory<I, K>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::new(MemorySource::new(documents))
    }
}
