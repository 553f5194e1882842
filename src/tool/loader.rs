use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use strum::IntoEnumIterator;

use crate::{
    availability::{ServiceAvailabilityChecker, ServiceId},
    config::ExternalApiSettings,
    search::SearchService,
    tool::{
        CategorizedTool, Tool, ToolCategory, ToolMetadata,
        builtin::{
            BankLookupTool, CallReportTool, FinancialRatiosTool, RagSearchTool,
            RestaurantRatingsTool, current_time_tool,
        },
    },
};

/// Where the loader is in its lifecycle. Loading tools before checking
/// services implicitly runs the check first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoaderState {
    #[default]
    Uninitialized,
    ServicesChecked,
    ToolsLoaded,
}

/// Everything the loader needs to construct tools: external API settings, a
/// shared HTTP client, and the search service for the document tools (absent
/// when no vector store is configured).
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub external: ExternalApiSettings,
    pub client: reqwest::Client,
    pub search: Option<SearchService>,
}

/// Builds the tool set from what is actually reachable.
///
/// Each category has a fixed recipe of tools, every tool gated on the
/// services it needs. An unavailable service silently shrinks the tool set;
/// it never fails the load.
pub struct DynamicToolLoader {
    checker: Arc<ServiceAvailabilityChecker>,
    ctx: ToolContext,
    state: LoaderState,
    available: HashMap<ServiceId, bool>,
    cache: BTreeMap<ToolCategory, Vec<CategorizedTool>>,
    /// Shared between the banking and analysis recipes so both draw on one
    /// response cache.
    call_reports: CallReportTool,
}

impl std::fmt::Debug for DynamicToolLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicToolLoader")
            .field("state", &self.state)
            .field("available", &self.available)
            .finish()
    }
}

impl DynamicToolLoader {
    pub fn new(checker: Arc<ServiceAvailabilityChecker>, ctx: ToolContext) -> Self {
        let call_reports = CallReportTool::new(&ctx.external, ctx.client.clone());
        Self {
            checker,
            ctx,
            state: LoaderState::default(),
            available: HashMap::new(),
            cache: BTreeMap::new(),
            call_reports,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Probes every known service and records the verdicts.
    pub async fn check_service_availability(&mut self) -> HashMap<ServiceId, bool> {
        self.available = self.checker.check_all().await;
        if self.state == LoaderState::Uninitialized {
            self.state = LoaderState::ServicesChecked;
        }
        self.available.clone()
    }

    fn services_ok(&self, required: &[ServiceId]) -> bool {
        required
            .iter()
            .all(|s| self.available.get(s).copied().unwrap_or(false))
    }

    /// Builds one tool if its services are up, logging the skip otherwise.
    fn gated(
        &self,
        meta: ToolMetadata,
        build: impl FnOnce(&ToolContext) -> Option<Tool>,
    ) -> Option<CategorizedTool> {
        if !self.services_ok(&meta.required_services) {
            log::info!(
                "skipping a {} tool: required services unavailable",
                meta.category
            );
            return None;
        }
        build(&self.ctx).map(|tool| CategorizedTool::new(tool, meta))
    }

    fn build_category(&self, category: ToolCategory) -> Vec<CategorizedTool> {
        let tools = match category {
            ToolCategory::Documents => vec![self.gated(
                ToolMetadata::new(category)
                    .requires(ServiceId::VectorStore)
                    .priority(10)
                    .tag("rag"),
                |ctx| {
                    let Some(search) = ctx.search.clone() else {
                        log::info!("no search service configured; skipping rag_search");
                        return None;
                    };
                    Some(Tool::new_rag_search(RagSearchTool::new(search)))
                },
            )],
            ToolCategory::Banking => vec![
                self.gated(
                    ToolMetadata::new(category)
                        .requires(ServiceId::BankDirectory)
                        .priority(10)
                        .tag("fdic"),
                    |ctx| {
                        Some(Tool::new_bank_lookup(BankLookupTool::new(
                            &ctx.external,
                            ctx.client.clone(),
                        )))
                    },
                ),
                self.gated(
                    ToolMetadata::new(category)
                        .requires(ServiceId::CallReport)
                        .priority(20)
                        .tag("regulatory"),
                    |_| Some(Tool::new_call_report(self.call_reports.clone())),
                ),
            ],
            ToolCategory::Analysis => vec![self.gated(
                ToolMetadata::new(category)
                    .requires(ServiceId::CallReport)
                    .priority(10)
                    .tag("ratios"),
                |_| {
                    Some(Tool::new_financial_ratios(FinancialRatiosTool::new(
                        self.call_reports.clone(),
                    )))
                },
            )],
            ToolCategory::Web => vec![self.gated(
                ToolMetadata::new(category)
                    .requires(ServiceId::RestaurantRatings)
                    .priority(10),
                |ctx| {
                    Some(Tool::new_restaurant_ratings(RestaurantRatingsTool::new(
                        &ctx.external,
                        ctx.client.clone(),
                    )))
                },
            )],
            ToolCategory::Utilities => vec![self.gated(
                ToolMetadata::new(category).priority(10).tag("clock"),
                |_| Some(Tool::new_function(current_time_tool())),
            )],
        };
        tools.into_iter().flatten().collect()
    }

    /// Returns the loadable tools of one category, building and caching them
    /// on first use. Never errors; a category whose services are down is
    /// simply empty.
    pub async fn load_tools_by_category(&mut self, category: ToolCategory) -> Vec<CategorizedTool> {
        if self.state == LoaderState::Uninitialized {
            self.check_service_availability().await;
        }
        if let Some(cached) = self.cache.get(&category) {
            return cached.clone();
        }
        let tools = self.build_category(category);
        log::info!("loaded {} tools for category {category}", tools.len());
        self.cache.insert(category, tools.clone());
        tools
    }

    /// Loads every category, omitting the ones that came up empty.
    pub async fn load_all_available_tools(
        &mut self,
    ) -> BTreeMap<ToolCategory, Vec<CategorizedTool>> {
        let mut all = BTreeMap::new();
        for category in ToolCategory::iter() {
            let tools = self.load_tools_by_category(category).await;
            if !tools.is_empty() {
                all.insert(category, tools);
            }
        }
        self.state = LoaderState::ToolsLoaded;
        all
    }

    /// Drops cached tools and availability verdicts, then loads afresh. The
    /// recovery path after a service comes back up.
    pub async fn reload_tools(&mut self) -> BTreeMap<ToolCategory, Vec<CategorizedTool>> {
        self.cache.clear();
        self.checker.clear_cache().await;
        self.check_service_availability().await;
        self.load_all_available_tools().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvailabilitySettings;
    use crate::availability::ProbeFn;

    fn checker_where(up: &[ServiceId]) -> Arc<ServiceAvailabilityChecker> {
        let mut probes: HashMap<ServiceId, Arc<ProbeFn>> = HashMap::new();
        for service in ServiceId::ALL {
            let verdict = up.contains(&service);
            probes.insert(
                service,
                Arc::new(move || {
                    Box::pin(async move { verdict }) as futures::future::BoxFuture<'static, bool>
                }) as Arc<ProbeFn>,
            );
        }
        Arc::new(ServiceAvailabilityChecker::with_probes(
            &AvailabilitySettings::default(),
            probes,
        ))
    }

    fn loader_where(up: &[ServiceId]) -> DynamicToolLoader {
        DynamicToolLoader::new(
            checker_where(up),
            ToolContext {
                external: ExternalApiSettings::default(),
                client: reqwest::Client::new(),
                search: None,
            },
        )
    }

    #[tokio::test]
    async fn banking_is_empty_when_its_services_are_down() {
        let mut loader = loader_where(&[]);
        let tools = loader.load_tools_by_category(ToolCategory::Banking).await;
        assert!(tools.is_empty());
        assert_eq!(loader.state(), LoaderState::ServicesChecked);
    }

    #[tokio::test]
    async fn partially_available_banking_loads_what_it_can() {
        let mut loader = loader_where(&[ServiceId::BankDirectory]);
        let tools = loader.load_tools_by_category(ToolCategory::Banking).await;
        let names: Vec<String> = tools.iter().map(|t| t.tool.name()).collect();
        assert_eq!(names, vec!["bank_lookup"]);
    }

    #[tokio::test]
    async fn utilities_load_without_any_services() {
        let mut loader = loader_where(&[]);
        let tools = loader.load_tools_by_category(ToolCategory::Utilities).await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool.name(), "current_time");
    }

    #[tokio::test]
    async fn documents_need_a_search_service_even_when_the_store_is_up() {
        // The store is reachable but no search service was wired in; the
        // category comes up empty rather than failing.
        let mut loader = loader_where(&[ServiceId::VectorStore]);
        let tools = loader.load_tools_by_category(ToolCategory::Documents).await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn load_all_skips_empty_categories_and_reload_reprobes() {
        let mut loader = loader_where(&[ServiceId::CallReport]);
        let all = loader.load_all_available_tools().await;
        assert_eq!(loader.state(), LoaderState::ToolsLoaded);
        assert!(all.contains_key(&ToolCategory::Banking));
        assert!(all.contains_key(&ToolCategory::Analysis));
        assert!(all.contains_key(&ToolCategory::Utilities));
        assert!(!all.contains_key(&ToolCategory::Documents));
        assert!(!all.contains_key(&ToolCategory::Web));

        let banking: Vec<String> = all[&ToolCategory::Banking]
            .iter()
            .map(|t| t.tool.name())
            .collect();
        assert_eq!(banking, vec!["call_report"]);

        let reloaded = loader.reload_tools().await;
        assert_eq!(reloaded.len(), all.len());
    }
}
