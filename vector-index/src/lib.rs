pub mod document;
pub mod index;
pub mod lifecycle;
pub mod persist;
pub mod retriever;
pub mod scoring;

pub use document::Document;
pub use index::{IndexManifest, IndexNode, VectorIndex};
pub use lifecycle::IndexLifecycleManager;
pub use retriever::{RetrievedNode, Retriever};
