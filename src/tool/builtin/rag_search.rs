use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    search::SearchService,
    tool::{ToolBehavior, builtin::string_arg},
    value::{RagQuery, ToolDesc, ToolDescBuilder},
};

/// Exposes the retrieval-augmented document search as a callable tool, so the
/// model can consult the uploaded documents mid-conversation.
#[derive(Clone, Debug)]
pub struct RagSearchTool {
    service: SearchService,
}

impl RagSearchTool {
    pub fn new(service: SearchService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolBehavior for RagSearchTool {
    fn desc(&self) -> ToolDesc {
        ToolDescBuilder::new("rag_search")
            .description(
                "Search the uploaded documents and answer a question from them. \
                 Returns the answer together with the sources it was drawn from.",
            )
            .parameters(json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Question to answer from the documents"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of document excerpts to consider"
                    }
                },
                "required": ["query"]
            }))
            .build()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        let query_text = match string_arg(&args, "query") {
            Ok(query) => query,
            Err(error) => return Ok(error),
        };
        let mut query = RagQuery::new(query_text);
        if let Some(max_results) = args.get("max_results").and_then(|v| v.as_u64()) {
            query = query.with_max_results(max_results.max(1) as usize);
        }

        let response = self.service.search_and_generate(&query).await;
        Ok(json!({
            "answer": response.answer,
            "mode": response.mode.to_string(),
            "confidence": response.confidence,
            "sources": response.sources(),
        }))
    }
}
