use common::{
    storage::store::StoreResolver,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub stores: StoreResolver,
    pub embeddings: EmbeddingProvider,
}

impl ApiState {
    pub fn new(config: &AppConfig, embeddings: EmbeddingProvider) -> Self {
        Self {
            config: config.clone(),
            stores: StoreResolver::new(config.clone()),
            embeddings,
        }
    }
}
