use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{
    future::{BoxFuture, join_all},
    lock::Mutex,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    config::{AvailabilitySettings, ExternalApiSettings},
    vector_store::VectorStore,
};

/// The backing services that gate which tools get loaded.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceId {
    VectorStore,
    BankDirectory,
    CallReport,
    RestaurantRatings,
}

impl ServiceId {
    pub const ALL: [ServiceId; 4] = [
        ServiceId::VectorStore,
        ServiceId::BankDirectory,
        ServiceId::CallReport,
        ServiceId::RestaurantRatings,
    ];
}

/// A probe answers "is this service reachable right now". It never errors;
/// any failure is just `false`.
pub type ProbeFn = dyn Fn() -> BoxFuture<'static, bool> + Send + Sync;

#[derive(Clone, Copy, Debug)]
struct CachedResult {
    available: bool,
    probed_at: Instant,
}

/// Probes service reachability and caches the verdicts.
///
/// Results are cached for the configured TTL regardless of outcome, so a
/// service that was down stays reported as down until the entry expires or
/// [`clear_cache`](Self::clear_cache) is called. A `reload` is the way to
/// pick up a recovered service early.
pub struct ServiceAvailabilityChecker {
    probes: HashMap<ServiceId, Arc<ProbeFn>>,
    cache: Mutex<HashMap<ServiceId, CachedResult>>,
    ttl: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for ServiceAvailabilityChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAvailabilityChecker")
            .field("ttl", &self.ttl)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

fn http_probe(client: reqwest::Client, url: String) -> Arc<ProbeFn> {
    Arc::new(move || {
        let client = client.clone();
        let url = url.clone();
        Box::pin(async move {
            match client.get(&url).send().await {
                Ok(resp) => !resp.status().is_server_error(),
                Err(_) => false,
            }
        })
    })
}

fn store_probe(store: Option<VectorStore>) -> Arc<ProbeFn> {
    Arc::new(move || {
        let store = store.clone();
        Box::pin(async move {
            match store {
                Some(store) => store.heartbeat().await.is_ok(),
                None => false,
            }
        })
    })
}

impl ServiceAvailabilityChecker {
    /// Builds the default probe table: an HTTP reachability check for each
    /// external API and a heartbeat for the vector store. A missing store is
    /// always unavailable.
    pub fn new(
        settings: &AvailabilitySettings,
        external: &ExternalApiSettings,
        store: Option<VectorStore>,
        client: reqwest::Client,
    ) -> Self {
        let mut probes: HashMap<ServiceId, Arc<ProbeFn>> = HashMap::new();
        probes.insert(ServiceId::VectorStore, store_probe(store));
        probes.insert(
            ServiceId::BankDirectory,
            http_probe(client.clone(), external.fdic_base_url.clone()),
        );
        probes.insert(
            ServiceId::CallReport,
            http_probe(client.clone(), external.call_report_base_url.clone()),
        );
        probes.insert(
            ServiceId::RestaurantRatings,
            http_probe(client, external.ratings_base_url.clone()),
        );
        Self::with_probes(settings, probes)
    }

    /// Checker with caller-supplied probes. The seam tests use.
    pub fn with_probes(
        settings: &AvailabilitySettings,
        probes: HashMap<ServiceId, Arc<ProbeFn>>,
    ) -> Self {
        Self {
            probes,
            cache: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(settings.cache_ttl_secs),
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        }
    }

    /// Returns whether `service` is available, probing only when the cached
    /// verdict has expired. A service with no registered probe is unavailable.
    pub async fn check(&self, service: ServiceId) -> bool {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&service)
                && cached.probed_at.elapsed() < self.ttl
            {
                return cached.available;
            }
        }

        let available = match self.probes.get(&service) {
            Some(probe) => tokio::time::timeout(self.probe_timeout, probe())
                .await
                .unwrap_or(false),
            None => false,
        };
        if !available {
            log::warn!("service {service} is unavailable");
        }

        let mut cache = self.cache.lock().await;
        cache.insert(
            service,
            CachedResult {
                available,
                probed_at: Instant::now(),
            },
        );
        available
    }

    /// Checks several services concurrently.
    pub async fn check_many(&self, services: &[ServiceId]) -> HashMap<ServiceId, bool> {
        let verdicts = join_all(services.iter().map(|&s| async move { (s, self.check(s).await) }))
            .await;
        verdicts.into_iter().collect()
    }

    /// Checks every known service.
    pub async fn check_all(&self) -> HashMap<ServiceId, bool> {
        self.check_many(&ServiceId::ALL).await
    }

    /// Drops every cached verdict so the next check re-probes.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}
