mod bank_lookup;
mod call_report;
mod rag_search;
mod restaurant;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

pub use bank_lookup::BankLookupTool;
pub use call_report::{CallReportTool, FinancialRatiosTool};
use chrono::Utc;
use futures::lock::Mutex;
pub use rag_search::RagSearchTool;
pub use restaurant::RestaurantRatingsTool;
use serde_json::{Value, json};

use crate::{
    config::ExternalApiSettings,
    error::FinchError,
    tool::FunctionTool,
    utils::retry_with_backoff,
};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

/// Spaces out requests to one upstream API.
#[derive(Clone, Debug)]
pub(crate) struct RateLimiter {
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Waits until the minimum interval since the previous request has
    /// elapsed, then claims the slot.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Shared plumbing for the external-API tools: one reqwest client, a TTL
/// response cache keyed by full request URL, a rate limiter, and bounded
/// retry on transient failures.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: reqwest::Client,
    cache: Arc<Mutex<HashMap<String, (Value, Instant)>>>,
    cache_ttl: Duration,
    limiter: RateLimiter,
    retry_attempts: u32,
    service: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .finish()
    }
}

fn classify_status(service: &str, status: reqwest::StatusCode, body: &str) -> FinchError {
    let message = format!("{status}: {body}");
    match status.as_u16() {
        401 | 403 => FinchError::Auth {
            service: service.to_owned(),
            message,
        },
        408 | 429 => FinchError::Transient {
            service: service.to_owned(),
            message,
        },
        500..=599 => FinchError::Transient {
            service: service.to_owned(),
            message,
        },
        _ => FinchError::Model(format!("{service} request failed: {message}")),
    }
}

impl ApiClient {
    pub(crate) fn new(settings: &ExternalApiSettings, service: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl: Duration::from_secs(settings.response_cache_ttl_secs),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            retry_attempts: settings.retry_attempts,
            service: service.to_owned(),
        }
    }

    /// GET the url and parse JSON, serving repeats from the cache while the
    /// entry is fresh.
    pub(crate) async fn get_json(&self, url: &str) -> Result<Value, FinchError> {
        {
            let cache = self.cache.lock().await;
            if let Some((value, fetched_at)) = cache.get(url)
                && fetched_at.elapsed() < self.cache_ttl
            {
                return Ok(value.clone());
            }
        }

        let value = retry_with_backoff(self.retry_attempts, RETRY_BASE_DELAY, &self.service, || async {
            self.limiter.acquire().await;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FinchError::Transient {
                    service: self.service.clone(),
                    message: e.to_string(),
                })?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(&self.service, status, &body));
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| FinchError::Model(format!("{} returned malformed JSON: {e}", self.service)))
        })
        .await?;

        let mut cache = self.cache.lock().await;
        cache.insert(url.to_owned(), (value.clone(), Instant::now()));
        Ok(value)
    }
}

/// Reads a required string argument, reporting its absence as a tool-level
/// error value the model can react to.
pub(crate) fn string_arg(args: &Value, key: &str) -> Result<String, Value> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
        _ => Err(json!({ "error": format!("missing required argument '{key}'") })),
    }
}

/// Always-on clock tool; the one utility loaded without any service gate.
pub fn current_time_tool() -> FunctionTool {
    FunctionTool::from_fn(
        "current_time",
        "Returns the current UTC date and time in RFC 3339 format",
        |_args| async move {
            Ok(json!({
                "utc": Utc::now().to_rfc3339(),
            }))
        },
    )
}
