use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::{
    tool::ToolBehavior,
    value::{ToolDesc, ToolDescBuilder},
};

pub type ToolRunFunc = dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// A tool backed by a caller-supplied async function.
#[derive(Clone)]
pub struct FunctionTool {
    desc: ToolDesc,
    f: Arc<ToolRunFunc>,
}

impl Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("desc", &self.desc)
            .finish()
    }
}

impl FunctionTool {
    pub fn new(desc: ToolDesc, f: Arc<ToolRunFunc>) -> Self {
        Self { desc, f }
    }

    /// Convenience constructor for tools with no parameter schema.
    pub fn from_fn<F, Fut>(name: &str, description: &str, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            desc: ToolDescBuilder::new(name).description(description).build(),
            f: Arc::new(move |args| Box::pin(f(args))),
        }
    }
}

#[async_trait]
impl ToolBehavior for FunctionTool {
    fn desc(&self) -> ToolDesc {
        self.desc.clone()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        (self.f)(args).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn function_tool_runs_closure() -> anyhow::Result<()> {
        let tool = FunctionTool::from_fn("echo", "Echoes its arguments back", |args| async move {
            Ok(json!({ "echoed": args }))
        });
        assert_eq!(tool.desc().name, "echo");
        let out = tool.run(json!({"x": 1})).await?;
        assert_eq!(out["echoed"]["x"], 1);
        Ok(())
    }
}
