pub mod availability;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod document;
pub mod error;
pub mod model;
pub mod search;
pub mod tool;
pub(crate) mod utils;
pub mod value;
pub mod vector_store;

pub use availability::{ServiceAvailabilityChecker, ServiceId};
pub use config::Settings;
pub use conversation::Conversation;
pub use document::{DocumentProcessor, DocumentStore};
pub use error::{FinchError, Result};
pub use model::{ChatModel, EmbeddingModel};
pub use search::SearchService;
pub use tool::{
    CategorizedTool, DynamicToolLoader, Tool, ToolBehavior, ToolCategory, ToolMetadata,
    ToolRegistry,
};
pub use value::{DocumentChunk, RagQuery, RagResponse, SearchResult};
pub use vector_store::VectorStore;
