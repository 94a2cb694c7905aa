use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{DocumentLoader, LoadError, Source};

/// Reads `file://` documents with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

#[async_trait]
impl Source for FileSource {
    async fn fetch(&self, uri: &str) -> Result<Value, LoadError> {
        let url = Url::parse(uri).map_err(|_| LoadError::UnsupportedScheme(uri.to_string()))?;
        if url.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme(uri.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| LoadError::UnsupportedScheme(uri.to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(uri.to_string())
            } else {
                LoadError::Io {
                    uri: uri.to_string(),
                    source,
                }
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|source| LoadError::Json {
            uri: uri.to_string(),
            source,
        })
    }
}

impl DocumentLoader<FileSource> {
    pub fn files() -> Self {
        Self::new(FileSource)
    }
}

#[cfg(test)]
mod tests {
    use crate::loader::{to_uri, FileLoader, LoadError, Loader};
    use schemaforge_core::Resolver;

    #[tokio::test]
    async fn reads_documents_and_their_references_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("order.json"),
            r#"{ "type": "object", "properties": { "customer": { "$ref": "customer.json" } } }"#,
        )
        .expect("write order");
        std::fs::write(
            dir.path().join("customer.json"),
            r#"{ "type": "object", "properties": { "name": { "type": "string" } } }"#,
        )
        .expect("write customer");

        let loader = FileLoader::files();
        let path = dir.path().join("order.json");
        let root = loader
            .load(path.to_str().expect("utf-8 path"))
            .await
            .expect("load");

        let customer_uri = to_uri(
            dir.path()
                .join("customer.json")
                .to_str()
                .expect("utf-8 path"),
        )
        .expect("uri");
        assert!(root.properties.contains_key("customer"));
        assert!(loader.resolve(&customer_uri).is_some());
    }

    #[tokio::test]
    async fn remote_schemes_are_unsupported() {
        let loader = FileLoader::files();
        let err = loader
            .load("https://example.com/schema.json")
            .await
            .expect_err("remote");
        assert!(matches!(err, LoadError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn malformed_json_is_reported_with_uri() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");

        let err = FileLoader::files()
            .load(path.to_str().expect("utf-8 path"))
            .await
            .expect_err("broken");
        assert!(matches!(err, LoadError::Json { .. }));
    }
}
