use common::{
    error::AppError,
    storage::store::{object_path_basename, validate_object_path, StorageManager},
    utils::embedding::EmbeddingProvider,
};
use tracing::info;

use crate::{document::Document, index::VectorIndex, persist};

/// Owns one named index's existence check, creation, load, document
/// insertion, and persistence against an object store.
///
/// Identity `(store, path)` is fixed at construction. Each invocation builds
/// its own manager; nothing is shared or locked across invocations, and
/// concurrent writers to the same path are last-write-wins at the store.
#[derive(Debug)]
pub struct IndexLifecycleManager {
    storage: StorageManager,
    embeddings: EmbeddingProvider,
    index_path: String,
}

impl IndexLifecycleManager {
    pub fn new(
        storage: StorageManager,
        embeddings: EmbeddingProvider,
        index_path: &str,
    ) -> Result<Self, AppError> {
        validate_object_path(index_path)?;
        Ok(Self {
            storage,
            embeddings,
            index_path: index_path.to_string(),
        })
    }

    /// Index identifier: the final segment of the index path.
    pub fn index_id(&self) -> &str {
        object_path_basename(&self.index_path)
    }

    pub fn index_path(&self) -> &str {
        &self.index_path
    }

    /// True iff the store reports at least one object under the index path.
    pub async fn exists(&self) -> Result<bool, AppError> {
        Ok(self.storage.prefix_exists(&self.index_path).await?)
    }

    /// Construct a new empty index, persist it, and return the handle.
    ///
    /// Overwrites whatever was previously at the path.
    pub async fn create_empty(&self) -> Result<VectorIndex, AppError> {
        let mut index = VectorIndex::new_empty(self.index_id(), &self.embeddings);
        self.persist(&mut index).await?;
        info!(index_id = %self.index_id(), path = %self.index_path, "Created empty index");
        Ok(index)
    }

    /// Strict load: fails with [`AppError::IndexNotFound`] when nothing is
    /// persisted under the path.
    pub async fn load(&self) -> Result<VectorIndex, AppError> {
        if !self.exists().await? {
            return Err(AppError::IndexNotFound(self.index_path.clone()));
        }
        let index = persist::load(&self.storage, &self.index_path).await?;

        // A handle embedded with one dimension cannot be queried with another.
        if index.manifest().dimension != self.embeddings.dimension() {
            return Err(AppError::Validation(format!(
                "index at '{}' was embedded with dimension {}, provider uses {}",
                self.index_path,
                index.manifest().dimension,
                self.embeddings.dimension()
            )));
        }
        Ok(index)
    }

    /// The standard construction entry point: load when persisted, otherwise
    /// create (and persist) an empty index.
    pub async fn resolve(&self) -> Result<VectorIndex, AppError> {
        if self.exists().await? {
            self.load().await
        } else {
            self.create_empty().await
        }
    }

    /// Read, parse, and insert each referenced document, then persist the
    /// handle exactly once.
    ///
    /// Fail-fast: the first missing or malformed blob aborts the batch with
    /// [`AppError::DocumentRead`] and nothing is persisted, so a partially
    /// inserted index never reaches storage.
    pub async fn insert_documents(
        &self,
        index: &mut VectorIndex,
        locators: &[String],
    ) -> Result<(), AppError> {
        for locator in locators {
            validate_object_path(locator)?;
            let bytes = self.storage.get(locator).await.map_err(|e| match e {
                object_store::Error::NotFound { .. } => {
                    AppError::DocumentRead(format!("document blob missing at '{locator}'"))
                }
                other => AppError::Storage(other),
            })?;
            let document = Document::from_bytes(locator, &bytes)?;
            index
                .insert_document(locator, &document, &self.embeddings)
                .await?;
        }

        self.persist(index).await?;
        info!(
            index_id = %self.index_id(),
            documents = locators.len(),
            revision = index.revision(),
            "Inserted document batch"
        );
        Ok(())
    }

    /// Serialize the handle and overwrite the blobs under the index path.
    pub async fn persist(&self, index: &mut VectorIndex) -> Result<(), AppError> {
        persist::save(&self.storage, &self.index_path, index).await
    }
}
