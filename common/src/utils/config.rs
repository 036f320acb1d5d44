use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
    S3,
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    Hashed,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Hashed
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// Owner identifier of the storage account this deployment serves.
    /// Requests naming a different account are rejected at the boundary.
    pub storage_account: String,
    /// Default container, used by the readiness probe.
    pub storage_container: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub http_port: u16,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_retrieval_top_k() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_account: String::new(),
            storage_container: String::new(),
            data_dir: default_data_dir(),
            http_port: 0,
            storage: default_storage_kind(),
            embedding_backend: default_embedding_backend(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            openai_api_key: None,
            openai_base_url: default_base_url(),
            retrieval_top_k: default_retrieval_top_k(),
        }
    }
}

impl AppConfig {
    /// Validates cross-field constraints that serde defaults cannot express.
    /// Called once at startup so misconfiguration fails before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_account.trim().is_empty() {
            return Err(ConfigError::Message(
                "storage_account must not be empty".into(),
            ));
        }
        if self.storage_container.trim().is_empty() {
            return Err(ConfigError::Message(
                "storage_container must not be empty".into(),
            ));
        }
        if self.embedding_backend == EmbeddingBackend::OpenAI
            && self.openai_api_key.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Message(
                "openai_api_key is required when embedding_backend is 'openai'".into(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(ConfigError::Message(
                "embedding_dimensions must be greater than zero".into(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::Message(
                "retrieval_top_k must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
