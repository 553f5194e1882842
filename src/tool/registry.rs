use std::{collections::HashMap, time::Duration};

use serde_json::{Value, json};

use crate::{
    config::ToolSettings,
    tool::{CategorizedTool, ToolBehavior, ToolCategory},
    value::ToolDesc,
};

/// Holds the tools currently exposed to the model, keyed by name, and runs
/// them under a soft timeout.
///
/// Execution never returns `Err`: an unknown tool, a tool failure and a
/// timeout all become a structured `{"success": false, ...}` value, so the
/// conversational layer can relay the failure instead of aborting the turn.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<String, CategorizedTool>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(&ToolSettings::default())
    }
}

impl ToolRegistry {
    pub fn new(settings: &ToolSettings) -> Self {
        Self {
            tools: HashMap::new(),
            timeout: Duration::from_secs(settings.execution_timeout_secs),
        }
    }

    /// Registers a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: CategorizedTool) {
        let name = tool.tool.name();
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("tool {name} re-registered, replacing the previous one");
        }
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = CategorizedTool>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&CategorizedTool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptions of every registered tool, sorted by name for stable
    /// prompt construction.
    pub fn descriptions(&self) -> Vec<ToolDesc> {
        let mut descs: Vec<ToolDesc> = self.tools.values().map(|t| t.tool.desc()).collect();
        descs.sort_by(|a, b| a.name.cmp(&b.name));
        descs
    }

    /// Names of the registered tools in `category`.
    pub fn names_in_category(&self, category: ToolCategory) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .values()
            .filter(|t| t.meta.category == category)
            .map(|t| t.tool.name())
            .collect();
        names.sort();
        names
    }

    /// Runs the named tool with `args` under the execution timeout.
    pub async fn execute(&self, name: &str, args: Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            return json!({
                "success": false,
                "error": format!("unknown tool '{name}'"),
            });
        };
        match tokio::time::timeout(self.timeout, tool.tool.run(args)).await {
            Ok(Ok(result)) => json!({ "success": true, "result": result }),
            Ok(Err(err)) => {
                log::warn!("tool {name} failed: {err:#}");
                json!({ "success": false, "error": err.to_string() })
            }
            Err(_) => {
                log::warn!("tool {name} timed out after {:?}", self.timeout);
                json!({
                    "success": false,
                    "error": format!("tool '{name}' timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }
}
