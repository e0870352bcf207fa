//! Storage backends (§4.3, §4.0). A [`StorageLocation`] is a lake root: a
//! local filesystem directory for development/CI, or a cloud object store
//! for production. Both implement [`object_store::ObjectStore`], so every
//! layer above this one (log, partitioning, table engine) is backend-agnostic.

use std::sync::Arc;

use object_store::{ObjectStore, local::LocalFileSystem, parse_url};
use url::Url;

use crate::error::{IoError, PointlineResult};

/// A lake root: an [`ObjectStore`] plus the path prefix rows under it are
/// addressed relative to. Cheap to clone — the store is reference-counted.
#[derive(Clone)]
pub struct StorageLocation {
    store: Arc<dyn ObjectStore>,
    prefix: object_store::path::Path,
    uri: String,
}

impl std::fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageLocation").field("uri", &self.uri).finish()
    }
}

impl StorageLocation {
    /// A lake root rooted at a local directory. The directory is created if
    /// it doesn't already exist.
    pub fn local(root: impl AsRef<std::path::Path>) -> PointlineResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(IoError::Io)?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|e| IoError::ObjectStoreBuild {
            uri: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            store: Arc::new(store),
            prefix: object_store::path::Path::default(),
            uri: format!("file://{}", root.display()),
        })
    }

    /// A lake root parsed from a `s3://`, `gs://`, or `az://` URI (§4.0
    /// cloud backends, via `object_store`'s URL-based construction).
    pub fn cloud(uri: &str) -> PointlineResult<Self> {
        let url = Url::parse(uri).map_err(|e| IoError::ObjectStoreBuild {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        let (store, path) = parse_url(&url).map_err(|e| IoError::ObjectStoreBuild {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            store: Arc::new(store),
            prefix: path,
            uri: uri.to_string(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Resolve a path relative to the lake root into a full object-store path.
    pub fn resolve(&self, relative: &str) -> object_store::path::Path {
        self.prefix.parts().chain(object_store::path::Path::from(relative).parts()).collect()
    }

    pub async fn put(&self, relative: &str, bytes: bytes::Bytes) -> PointlineResult<()> {
        self.store
            .put(&self.resolve(relative), bytes.into())
            .await
            .map_err(|e| IoError::WriteFailed {
                path: relative.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub async fn get(&self, relative: &str) -> PointlineResult<bytes::Bytes> {
        let result = self
            .store
            .get(&self.resolve(relative))
            .await
            .map_err(|e| IoError::ReadFailed {
                path: relative.to_string(),
                reason: e.to_string(),
            })?;
        result.bytes().await.map_err(|e| {
            IoError::ReadFailed {
                path: relative.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub async fn exists(&self, relative: &str) -> PointlineResult<bool> {
        match self.store.head(&self.resolve(relative)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(IoError::ObjectStore(e.to_string()).into()),
        }
    }

    /// Atomic commit primitive: write only if `relative` doesn't already
    /// exist. Local filesystems and most cloud backends support this as a
    /// true compare-and-swap; it's how the transaction log serializes commits
    /// (§4.3 "atomic rename / compare-and-swap").
    pub async fn put_if_absent(&self, relative: &str, bytes: bytes::Bytes) -> PointlineResult<bool> {
        use object_store::PutMode;
        let outcome = self
            .store
            .put_opts(&self.resolve(relative), bytes.into(), PutMode::Create.into())
            .await;
        match outcome {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(IoError::WriteFailed {
                path: relative.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    pub async fn list(&self, relative_prefix: &str) -> PointlineResult<Vec<String>> {
        use futures::TryStreamExt;
        let prefix = self.resolve(relative_prefix);
        let entries: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| IoError::ObjectStore(e.to_string()))?;
        Ok(entries.into_iter().map(|meta| meta.location.to_string()).collect())
    }

    pub async fn delete(&self, relative: &str) -> PointlineResult<()> {
        self.store
            .delete(&self.resolve(relative))
            .await
            .map_err(|e| IoError::ObjectStore(e.to_string()))?;
        Ok(())
    }
}
