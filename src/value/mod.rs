pub(crate) mod chunk;
pub(crate) mod message;
pub(crate) mod search;
pub(crate) mod tool_desc;

pub use chunk::{DocumentChunk, FileType, ProcessingStatus};
pub use message::{Message, Role, TokenUsage};
pub use search::{ProcessingMode, RagQuery, RagResponse, SearchResult};
pub use tool_desc::{ToolDesc, ToolDescBuilder};

/// A dense vector produced by an embedding model.
pub type Embedding = Vec<f32>;

/// Free-form metadata attached to chunks and search results.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
