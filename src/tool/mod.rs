pub(crate) mod builtin;
pub(crate) mod function;
pub(crate) mod loader;
pub(crate) mod registry;

use std::collections::BTreeMap;

use async_trait::async_trait;
pub use builtin::{
    BankLookupTool, CallReportTool, FinancialRatiosTool, RagSearchTool, RestaurantRatingsTool,
};
pub use function::FunctionTool;
pub use loader::{DynamicToolLoader, LoaderState, ToolContext};
pub use registry::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{availability::ServiceId, value::ToolDesc};

/// The contract every tool satisfies: a self-description for the model and an
/// async JSON-in/JSON-out invocation.
#[async_trait]
pub trait ToolBehavior: Send + Sync {
    fn desc(&self) -> ToolDesc;

    async fn run(&self, args: Value) -> anyhow::Result<Value>;
}

#[derive(Clone, Debug)]
enum ToolInner {
    Function(FunctionTool),
    RagSearch(RagSearchTool),
    BankLookup(BankLookupTool),
    CallReport(CallReportTool),
    FinancialRatios(FinancialRatiosTool),
    RestaurantRatings(RestaurantRatingsTool),
}

/// Dispatching wrapper over the known tool kinds.
#[derive(Clone, Debug)]
pub struct Tool {
    inner: ToolInner,
}

impl Tool {
    pub fn new_function(tool: FunctionTool) -> Self {
        Self {
            inner: ToolInner::Function(tool),
        }
    }

    pub fn new_rag_search(tool: RagSearchTool) -> Self {
        Self {
            inner: ToolInner::RagSearch(tool),
        }
    }

    pub fn new_bank_lookup(tool: BankLookupTool) -> Self {
        Self {
            inner: ToolInner::BankLookup(tool),
        }
    }

    pub fn new_call_report(tool: CallReportTool) -> Self {
        Self {
            inner: ToolInner::CallReport(tool),
        }
    }

    pub fn new_financial_ratios(tool: FinancialRatiosTool) -> Self {
        Self {
            inner: ToolInner::FinancialRatios(tool),
        }
    }

    pub fn new_restaurant_ratings(tool: RestaurantRatingsTool) -> Self {
        Self {
            inner: ToolInner::RestaurantRatings(tool),
        }
    }

    pub fn name(&self) -> String {
        self.desc().name
    }
}

#[async_trait]
impl ToolBehavior for Tool {
    fn desc(&self) -> ToolDesc {
        match &self.inner {
            ToolInner::Function(t) => t.desc(),
            ToolInner::RagSearch(t) => t.desc(),
            ToolInner::BankLookup(t) => t.desc(),
            ToolInner::CallReport(t) => t.desc(),
            ToolInner::FinancialRatios(t) => t.desc(),
            ToolInner::RestaurantRatings(t) => t.desc(),
        }
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        match &self.inner {
            ToolInner::Function(t) => t.run(args).await,
            ToolInner::RagSearch(t) => t.run(args).await,
            ToolInner::BankLookup(t) => t.run(args).await,
            ToolInner::CallReport(t) => t.run(args).await,
            ToolInner::FinancialRatios(t) => t.run(args).await,
            ToolInner::RestaurantRatings(t) => t.run(args).await,
        }
    }
}

/// Functional grouping used to load and gate tools as a unit.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolCategory {
    Documents,
    Banking,
    Analysis,
    Web,
    Utilities,
}

impl ToolCategory {
    /// Best-effort category from a tool's name, for tools registered without
    /// explicit metadata. Unrecognized names land in [`Self::Utilities`].
    pub fn infer_from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("search") || lower.contains("document") || lower.contains("rag") {
            ToolCategory::Documents
        } else if lower.contains("bank") || lower.contains("call_report") {
            ToolCategory::Banking
        } else if lower.contains("ratio") || lower.contains("analy") {
            ToolCategory::Analysis
        } else if lower.contains("restaurant") || lower.contains("web") {
            ToolCategory::Web
        } else {
            ToolCategory::Utilities
        }
    }
}

/// Everything known about a tool besides its behavior: where it belongs,
/// which services it needs, and how to order it within its category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub category: ToolCategory,
    /// Services that must all be available for the tool to be loaded.
    pub required_services: Vec<ServiceId>,
    /// Lower loads first within a category.
    pub priority: u8,
    pub tags: Vec<String>,
}

impl ToolMetadata {
    pub fn new(category: ToolCategory) -> Self {
        Self {
            category,
            required_services: vec![],
            priority: 100,
            tags: vec![],
        }
    }

    pub fn requires(mut self, service: ServiceId) -> Self {
        self.required_services.push(service);
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// A tool paired with its metadata. The metadata travels alongside the tool
/// rather than being written into it, so the tool type stays oblivious to
/// categorization.
#[derive(Clone, Debug)]
pub struct CategorizedTool {
    pub tool: Tool,
    pub meta: ToolMetadata,
}

impl CategorizedTool {
    pub fn new(tool: Tool, meta: ToolMetadata) -> Self {
        Self { tool, meta }
    }

    /// Wraps a tool with metadata inferred from its name.
    pub fn inferred(tool: Tool) -> Self {
        let meta = ToolMetadata::new(ToolCategory::infer_from_name(&tool.name()));
        Self { tool, meta }
    }
}

/// Groups tools by category, each group sorted by ascending priority.
pub fn group_by_category(tools: Vec<CategorizedTool>) -> BTreeMap<ToolCategory, Vec<CategorizedTool>> {
    let mut grouped: BTreeMap<ToolCategory, Vec<CategorizedTool>> = BTreeMap::new();
    for tool in tools {
        grouped.entry(tool.meta.category).or_default().push(tool);
    }
    for group in grouped.values_mut() {
        group.sort_by_key(|t| t.meta.priority);
    }
    grouped
}
