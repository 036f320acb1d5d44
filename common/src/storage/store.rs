use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::error::AppError;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Thin wrapper around one `ObjectStore` backend, scoped to a single
/// container. All locations are container-relative `/`-separated paths.
#[derive(Clone, Debug)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create a StorageManager with a custom storage backend.
    ///
    /// Useful for testing scenarios where you want to inject a specific
    /// backend directly.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    fn with_local_base(store: DynStore, backend_kind: StorageKind, local_base: PathBuf) -> Self {
        Self {
            store,
            backend_kind,
            local_base: Some(local_base),
        }
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Access the resolved base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at the specified location, overwriting any previous object.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve the full contents at the specified location, buffered in memory.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        let prefix_path = prefix.map(ObjPath::from);
        self.store.list(prefix_path.as_ref()).try_collect().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }

    /// Check whether at least one object exists below the specified prefix.
    ///
    /// Stops at the first listing entry rather than draining the stream.
    pub async fn prefix_exists(&self, prefix: &str) -> object_store::Result<bool> {
        let prefix_path = ObjPath::from(prefix);
        let mut listing = self.store.list(Some(&prefix_path));
        match listing.next().await {
            Some(entry) => entry.map(|_| true),
            None => Ok(false),
        }
    }

    /// Delete all objects below the specified prefix.
    pub async fn delete_prefix(&self, prefix: &str) -> object_store::Result<()> {
        let prefix_path = ObjPath::from(prefix);
        let locations = self
            .store
            .list(Some(&prefix_path))
            .map_ok(|m| m.location)
            .boxed();
        self.store
            .delete_stream(locations)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }
}

/// Resolves the `(account, container)` coordinates of a request to a
/// [`StorageManager`].
///
/// The deployment serves exactly one storage account, configured at startup;
/// requests naming any other account are rejected before touching storage.
/// Containers map to a subdirectory (local), a shared in-process store
/// (memory), or a bucket with credentials from the environment (s3).
#[derive(Clone)]
pub struct StoreResolver {
    config: AppConfig,
    memory_containers: Arc<Mutex<HashMap<String, DynStore>>>,
}

impl StoreResolver {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            memory_containers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.config.storage_account
    }

    pub async fn resolve(
        &self,
        account_id: &str,
        container_id: &str,
    ) -> Result<StorageManager, AppError> {
        if account_id != self.config.storage_account {
            return Err(AppError::Validation(format!(
                "account '{account_id}' is not served by this deployment"
            )));
        }
        validate_container_name(container_id)?;

        match self.config.storage {
            StorageKind::Local => {
                let base = resolve_base_dir(&self.config).join(container_id);
                if !base.exists() {
                    tokio::fs::create_dir_all(&base).await?;
                }
                let store = LocalFileSystem::new_with_prefix(base.clone())?;
                Ok(StorageManager::with_local_base(
                    Arc::new(store),
                    StorageKind::Local,
                    base,
                ))
            }
            StorageKind::Memory => {
                let store = {
                    let mut containers = self
                        .memory_containers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    Arc::clone(
                        containers
                            .entry(container_id.to_owned())
                            .or_insert_with(|| Arc::new(InMemory::new())),
                    )
                };
                Ok(StorageManager::with_backend(store, StorageKind::Memory))
            }
            StorageKind::S3 => {
                let store = AmazonS3Builder::from_env()
                    .with_bucket_name(container_id)
                    .build()?;
                Ok(StorageManager::with_backend(
                    Arc::new(store),
                    StorageKind::S3,
                ))
            }
        }
    }
}

/// Containers are a single path component; anything that could traverse the
/// local data dir is rejected.
fn validate_container_name(container: &str) -> Result<(), AppError> {
    let well_formed = !container.is_empty()
        && container != "."
        && container != ".."
        && container
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if well_formed {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid container name '{container}'"
        )))
    }
}

/// Object paths are non-empty `/`-separated segments with no traversal
/// components.
pub fn validate_object_path(path: &str) -> Result<(), AppError> {
    let well_formed = !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if well_formed {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid object path '{path}'")))
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

/// Final path segment of a `/`-separated object path.
pub fn object_path_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Testing utilities for storage operations.
///
/// Provides memory-backed fixtures with proper test isolation for
/// dependent crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use crate::utils::config::{AppConfig, EmbeddingBackend};

    /// Create a test configuration with memory storage and hashed embeddings.
    pub fn test_config_memory() -> AppConfig {
        AppConfig {
            storage_account: "acct-test".into(),
            storage_container: "library".into(),
            data_dir: "/tmp/unused".into(), // Ignored for memory storage
            http_port: 0,
            storage: StorageKind::Memory,
            embedding_backend: EmbeddingBackend::Hashed,
            embedding_dimensions: 16,
            ..Default::default()
        }
    }

    /// Create a test configuration with local storage.
    pub fn test_config_local() -> AppConfig {
        let base = format!("/tmp/ctx_test_storage_{}", uuid::Uuid::new_v4());
        AppConfig {
            data_dir: base,
            storage: StorageKind::Local,
            ..test_config_memory()
        }
    }

    /// A memory-backed [`StorageManager`] for unit tests.
    pub fn memory_storage() -> StorageManager {
        StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    /// A [`StoreResolver`] over shared in-memory containers, so separate
    /// "invocations" against the same container observe each other's writes.
    pub fn memory_resolver() -> StoreResolver {
        StoreResolver::new(test_config_memory())
    }

    /// Best-effort removal of a local resolver's data dir.
    pub async fn local_base_cleanup(cfg: &AppConfig) {
        let base = resolve_base_dir(cfg);
        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
