//! Concurrent schema graph crawling.

pub mod crawler;
pub mod loader;
pub mod options;

pub use crawler::{CancelToken, CrawlError, Crawler, PlanStream};
pub use loader::{
    to_uri, DocumentLoader, FileLoader, FileSource, LoadError, Loader, MemoryLoader, MemorySource,
    Source,
};
pub use options::CrawlOptions;
