use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use text_splitter::TextSplitter;
use uuid::Uuid;

use common::{error::AppError, utils::embedding::EmbeddingProvider};

use crate::document::Document;

pub const FORMAT_VERSION: u32 = 1;

/// Index metadata persisted alongside the nodes.
///
/// `revision` increases by one on every persist, which makes batching
/// observable: inserting N documents in one batch advances it exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub index_id: String,
    pub format_version: u32,
    pub dimension: usize,
    pub embedding_backend: String,
    pub revision: u64,
    pub document_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One embedded chunk of a source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexNode {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// The in-memory index handle: manifest plus the flat node list.
///
/// Owned by a single lifecycle manager for the duration of one invocation;
/// never shared across concurrent invocations.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    nodes: Vec<IndexNode>,
}

impl VectorIndex {
    /// A fresh empty index. Not yet persisted; `revision` starts at zero and
    /// is advanced by the first persist.
    pub fn new_empty(index_id: &str, embeddings: &EmbeddingProvider) -> Self {
        let now = Utc::now();
        Self {
            manifest: IndexManifest {
                index_id: index_id.to_string(),
                format_version: FORMAT_VERSION,
                dimension: embeddings.dimension(),
                embedding_backend: embeddings.backend_label().to_string(),
                revision: 0,
                document_count: 0,
                created_at: now,
                updated_at: now,
            },
            nodes: Vec::new(),
        }
    }

    /// Reassemble a handle from its persisted parts.
    pub fn from_parts(manifest: IndexManifest, nodes: Vec<IndexNode>) -> Self {
        Self { manifest, nodes }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn nodes(&self) -> &[IndexNode] {
        &self.nodes
    }

    pub fn index_id(&self) -> &str {
        &self.manifest.index_id
    }

    pub fn revision(&self) -> u64 {
        self.manifest.revision
    }

    pub fn document_count(&self) -> usize {
        self.manifest.document_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Chunk, embed, and append one document. Does not persist.
    pub async fn insert_document(
        &mut self,
        locator: &str,
        document: &Document,
        embeddings: &EmbeddingProvider,
    ) -> Result<usize, AppError> {
        let splitter = TextSplitter::new(500..2000);
        let chunks: Vec<String> = splitter
            .chunks(&document.text)
            .map(ToOwned::to_owned)
            .collect();

        let document_id = document.effective_id(locator);
        let vectors = embeddings.embed_batch(chunks.clone()).await?;

        let inserted = chunks.len();
        for (text, embedding) in chunks.into_iter().zip(vectors) {
            self.nodes.push(IndexNode {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.clone(),
                text,
                embedding,
            });
        }
        self.manifest.document_count += 1;
        self.manifest.updated_at = Utc::now();

        tracing::debug!(
            index_id = %self.manifest.index_id,
            document_id = %document_id,
            nodes = inserted,
            "Inserted document into index"
        );
        Ok(inserted)
    }

    /// Called by the persistence layer when the handle is written out.
    pub(crate) fn mark_persisted(&mut self) {
        self.manifest.revision += 1;
        self.manifest.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> EmbeddingProvider {
        EmbeddingProvider::new_hashed(16).expect("provider")
    }

    fn doc(text: &str) -> Document {
        Document {
            id: None,
            text: text.to_string(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_new_empty_index() {
        let index = VectorIndex::new_empty("avalon", &provider());
        assert_eq!(index.index_id(), "avalon");
        assert_eq!(index.revision(), 0);
        assert_eq!(index.document_count(), 0);
        assert!(index.is_empty());
        assert_eq!(index.manifest().dimension, 16);
        assert_eq!(index.manifest().embedding_backend, "hashed");
    }

    #[tokio::test]
    async fn test_insert_short_document_yields_one_node() {
        let embeddings = provider();
        let mut index = VectorIndex::new_empty("avalon", &embeddings);

        let inserted = index
            .insert_document("lib/a.json", &doc("a short note about tokio"), &embeddings)
            .await
            .expect("insert");

        assert_eq!(inserted, 1);
        assert_eq!(index.nodes().len(), 1);
        assert_eq!(index.document_count(), 1);
        assert_eq!(index.nodes()[0].document_id, "lib/a.json");
        assert_eq!(index.nodes()[0].embedding.len(), 16);
    }

    #[tokio::test]
    async fn test_insert_long_document_is_chunked() {
        let embeddings = provider();
        let mut index = VectorIndex::new_empty("avalon", &embeddings);

        let long_text = "tokio worker threads drive the runtime. ".repeat(200);
        let inserted = index
            .insert_document("lib/long.json", &doc(&long_text), &embeddings)
            .await
            .expect("insert");

        assert!(inserted > 1, "expected multiple chunks, got {inserted}");
        assert_eq!(index.nodes().len(), inserted);
        assert_eq!(index.document_count(), 1);
        assert!(index
            .nodes()
            .iter()
            .all(|node| node.text.len() <= 2000 && !node.text.is_empty()));
    }

    #[tokio::test]
    async fn test_insert_uses_document_id_when_present() {
        let embeddings = provider();
        let mut index = VectorIndex::new_empty("avalon", &embeddings);
        let document = Document {
            id: Some("doc-7".into()),
            text: "named document".into(),
            metadata: Default::default(),
        };

        index
            .insert_document("lib/x.json", &document, &embeddings)
            .await
            .expect("insert");
        assert_eq!(index.nodes()[0].document_id, "doc-7");
    }
}
