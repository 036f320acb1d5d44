use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vector_index::{IndexLifecycleManager, RetrievedNode};

use common::error::AppError;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub account_id: String,
    pub container_id: String,
    pub index_path: String,
    pub operation: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveContextArgs {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InsertDocumentsArgs {
    pub documents: Vec<String>,
}

/// The closed set of dispatchable index operations.
#[derive(Debug)]
enum IndexOperation {
    RetrieveContext(RetrieveContextArgs),
    CreateIndex,
    InsertDocuments(InsertDocumentsArgs),
}

impl IndexOperation {
    /// Maps a wire operation name onto the closed set. Unknown names are
    /// rejected here, before any storage access happens.
    fn parse(operation: &str, args: serde_json::Value) -> Result<Self, AppError> {
        match operation {
            "retrieve_context" => {
                let args: RetrieveContextArgs = parse_args(operation, args)?;
                Ok(Self::RetrieveContext(args))
            }
            "create_index" => Ok(Self::CreateIndex),
            "insert_documents" => {
                let args: InsertDocumentsArgs = parse_args(operation, args)?;
                Ok(Self::InsertDocuments(args))
            }
            other => Err(AppError::UnsupportedOperation(other.to_string())),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    operation: &str,
    args: serde_json::Value,
) -> Result<T, AppError> {
    serde_json::from_value(args)
        .map_err(|e| AppError::Validation(format!("invalid args for {operation}: {e}")))
}

pub async fn dispatch_index_operation(
    State(state): State<ApiState>,
    Json(request): Json<IndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let operation = IndexOperation::parse(&request.operation, request.args)?;

    info!(
        account_id = %request.account_id,
        container_id = %request.container_id,
        index_path = %request.index_path,
        operation = %request.operation,
        "Dispatching index operation"
    );

    let storage = state
        .stores
        .resolve(&request.account_id, &request.container_id)
        .await?;
    let manager =
        IndexLifecycleManager::new(storage, state.embeddings.clone(), &request.index_path)?;

    let result = match operation {
        IndexOperation::RetrieveContext(args) => {
            // The query is the last message in the conversation.
            let query = args
                .messages
                .last()
                .ok_or_else(|| AppError::Validation("messages must not be empty".to_string()))?;

            let index = manager.resolve().await?;
            let nodes = index
                .retriever(&state.embeddings, state.config.retrieval_top_k)
                .retrieve(&query.message)
                .await?;
            json!(flatten_nodes(&nodes))
        }
        IndexOperation::CreateIndex => {
            let index = manager.create_empty().await?;
            json!({
                "index_id": index.index_id(),
                "revision": index.revision(),
            })
        }
        IndexOperation::InsertDocuments(args) => {
            let mut index = manager.resolve().await?;
            manager.insert_documents(&mut index, &args.documents).await?;
            json!({
                "index_id": index.index_id(),
                "document_count": index.document_count(),
                "revision": index.revision(),
            })
        }
    };

    Ok((
        StatusCode::OK,
        Json(json!({ "status": "success", "result": result })),
    ))
}

/// Concatenation of node texts in retriever order, internal newlines
/// replaced by spaces, joined by single spaces.
fn flatten_nodes(nodes: &[RetrievedNode]) -> String {
    nodes
        .iter()
        .map(|node| node.text.replace(['\n', '\r'], " "))
        .collect::<Vec<_>>()
        .join(" ")
}
