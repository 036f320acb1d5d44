use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use tracing::debug;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackend},
};

/// Embedding generation behind a backend selected by configuration.
///
/// The `openai` backend calls the embeddings endpoint; the `hashed` backend
/// is a deterministic token-bucket projection that needs no network and keeps
/// tests reproducible.
#[derive(Clone, Debug)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone, Debug)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn from_config(
        cfg: &AppConfig,
        openai_client: Option<Arc<Client<OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match cfg.embedding_backend {
            EmbeddingBackend::Hashed => Self::new_hashed(cfg.embedding_dimensions as usize),
            EmbeddingBackend::OpenAI => {
                let client = match openai_client {
                    Some(client) => client,
                    None => {
                        let api_key = cfg.openai_api_key.as_deref().ok_or_else(|| {
                            AppError::Validation(
                                "openai embedding backend requires an api key".into(),
                            )
                        })?;
                        Arc::new(Client::with_config(
                            OpenAIConfig::new()
                                .with_api_key(api_key)
                                .with_api_base(&cfg.openai_base_url),
                        ))
                    }
                };
                Ok(Self {
                    inner: EmbeddingInner::OpenAI {
                        client,
                        model: cfg.embedding_model.clone(),
                        dimensions: cfg.embedding_dimensions,
                    },
                })
            }
        }
    }

    pub fn new_hashed(dimension: usize) -> Result<Self, AppError> {
        Ok(Self {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        })
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::OpenAI { model, .. } => Some(model.clone()),
            EmbeddingInner::Hashed { .. } => None,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embedding = response
                    .data
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        AppError::Embedding("no embedding data received from API".into())
                    })?
                    .embedding;

                debug!(dimension = embedding.len(), "Generated embedding");
                Ok(embedding)
            }
        }
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .into_iter()
                .map(|text| hashed_embedding(&text, *dimension))
                .collect()),
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let expected = texts.len();
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(texts)
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                let embeddings: Vec<Vec<f32>> = response
                    .data
                    .into_iter()
                    .map(|item| item.embedding)
                    .collect();

                if embeddings.len() != expected {
                    return Err(AppError::Embedding(format!(
                        "expected {expected} embeddings, received {}",
                        embeddings.len()
                    )));
                }
                Ok(embeddings)
            }
        }
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::StorageKind;

    fn hashed_config() -> AppConfig {
        AppConfig {
            storage_account: "acct-test".into(),
            storage_container: "library".into(),
            storage: StorageKind::Memory,
            embedding_dimensions: 16,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_hashed_embedding_is_deterministic() {
        let provider = EmbeddingProvider::new_hashed(16).expect("provider");
        let a = provider.embed("tokio runtime scheduling").await.expect("embed");
        let b = provider.embed("tokio runtime scheduling").await.expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn test_hashed_embedding_is_unit_normalized() {
        let provider = EmbeddingProvider::new_hashed(32).expect("provider");
        let v = provider.embed("cosine similarity sanity").await.expect("embed");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[tokio::test]
    async fn test_hashed_embedding_empty_input() {
        let provider = EmbeddingProvider::new_hashed(8).expect("provider");
        let v = provider.embed("").await.expect("embed");
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_embed_batch_matches_single() {
        let provider = EmbeddingProvider::new_hashed(16).expect("provider");
        let single = provider.embed("alpha beta").await.expect("embed");
        let batch = provider
            .embed_batch(vec!["alpha beta".into(), "gamma".into()])
            .await
            .expect("batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], single);
    }

    #[test]
    fn test_from_config_hashed() {
        let provider =
            EmbeddingProvider::from_config(&hashed_config(), None).expect("provider");
        assert_eq!(provider.backend_label(), "hashed");
        assert_eq!(provider.dimension(), 16);
        assert!(provider.model_code().is_none());
    }

    #[test]
    fn test_from_config_openai_requires_key() {
        let cfg = AppConfig {
            embedding_backend: EmbeddingBackend::OpenAI,
            ..hashed_config()
        };
        assert!(matches!(
            EmbeddingProvider::from_config(&cfg, None),
            Err(AppError::Validation(_))
        ));

        let cfg = AppConfig {
            embedding_backend: EmbeddingBackend::OpenAI,
            openai_api_key: Some("sk-test".into()),
            ..hashed_config()
        };
        let provider = EmbeddingProvider::from_config(&cfg, None).expect("provider");
        assert_eq!(provider.backend_label(), "openai");
        assert_eq!(provider.model_code().as_deref(), Some("text-embedding-3-small"));
    }
}
