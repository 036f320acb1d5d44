use std::cmp::Ordering;

use common::{error::AppError, utils::embedding::EmbeddingProvider};

use crate::{
    index::VectorIndex,
    scoring::{clamp_unit, cosine_similarity},
};

/// A scored fragment of indexed content returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedNode {
    pub text: String,
    pub score: f32,
}

/// Query interface over a loaded index: exact cosine top-k over the nodes.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embeddings: &'a EmbeddingProvider,
    top_k: usize,
}

impl VectorIndex {
    pub fn retriever<'a>(
        &'a self,
        embeddings: &'a EmbeddingProvider,
        top_k: usize,
    ) -> Retriever<'a> {
        Retriever {
            index: self,
            embeddings,
            top_k,
        }
    }
}

impl Retriever<'_> {
    /// Rank every node against the query, most relevant first. Ties break on
    /// node id so ordering is stable across runs.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedNode>, AppError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embeddings.embed(query).await?;

        let mut scored: Vec<(&str, f32, &str)> = self
            .index
            .nodes()
            .iter()
            .map(|node| {
                let score = clamp_unit(cosine_similarity(&query_embedding, &node.embedding));
                (node.id.as_str(), score, node.text.as_str())
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        scored.truncate(self.top_k);

        tracing::debug!(
            index_id = %self.index.index_id(),
            candidates = self.index.nodes().len(),
            returned = scored.len(),
            "Ranked retrieval query"
        );

        Ok(scored
            .into_iter()
            .map(|(_, score, text)| RetrievedNode {
                text: text.to_string(),
                score,
            })
            .collect())
    }
}
