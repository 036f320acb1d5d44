use bytes::Bytes;

use common::{error::AppError, storage::store::StorageManager};

use crate::index::{IndexManifest, IndexNode, VectorIndex, FORMAT_VERSION};

pub const MANIFEST_BLOB: &str = "manifest.json";
pub const NODES_BLOB: &str = "nodes.json";

fn manifest_location(prefix: &str) -> String {
    format!("{prefix}/{MANIFEST_BLOB}")
}

fn nodes_location(prefix: &str) -> String {
    format!("{prefix}/{NODES_BLOB}")
}

/// Serialize the handle and overwrite the blobs under `prefix`.
///
/// Advances the manifest revision. Nodes are written before the manifest so
/// the manifest always describes data that is already in place.
pub async fn save(
    storage: &StorageManager,
    prefix: &str,
    index: &mut VectorIndex,
) -> Result<(), AppError> {
    index.mark_persisted();

    let nodes = serde_json::to_vec(index.nodes())?;
    storage.put(&nodes_location(prefix), Bytes::from(nodes)).await?;

    let manifest = serde_json::to_vec(index.manifest())?;
    storage
        .put(&manifest_location(prefix), Bytes::from(manifest))
        .await?;

    tracing::debug!(
        index_id = %index.index_id(),
        revision = index.revision(),
        nodes = index.nodes().len(),
        "Persisted index"
    );
    Ok(())
}

/// Deserialize the blobs under `prefix` into a handle.
///
/// Callers are expected to have checked prefix existence; a prefix that has
/// objects but lacks one of the index blobs is reported as a validation
/// failure, not as a missing index.
pub async fn load(storage: &StorageManager, prefix: &str) -> Result<VectorIndex, AppError> {
    let manifest_bytes = read_blob(storage, &manifest_location(prefix)).await?;
    let manifest: IndexManifest = serde_json::from_slice(&manifest_bytes)?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(AppError::Validation(format!(
            "index at '{prefix}' has unsupported format version {}",
            manifest.format_version
        )));
    }

    let nodes_bytes = read_blob(storage, &nodes_location(prefix)).await?;
    let nodes: Vec<IndexNode> = serde_json::from_slice(&nodes_bytes)?;

    Ok(VectorIndex::from_parts(manifest, nodes))
}

async fn read_blob(storage: &StorageManager, location: &str) -> Result<Bytes, AppError> {
    storage.get(location).await.map_err(|e| match e {
        object_store::Error::NotFound { .. } => {
            AppError::Validation(format!("index blob missing at '{location}'"))
        }
        other => AppError::Storage(other),
    })
}
