use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::ExternalApiSettings,
    error::FinchError,
    tool::{ToolBehavior, builtin::{ApiClient, string_arg}},
    value::{ToolDesc, ToolDescBuilder},
};

/// Queries the restaurant ratings API for inspection scores and ratings.
#[derive(Clone, Debug)]
pub struct RestaurantRatingsTool {
    api: ApiClient,
    base_url: String,
}

impl RestaurantRatingsTool {
    pub fn new(settings: &ExternalApiSettings, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(settings, "restaurant ratings", client),
            base_url: settings.ratings_base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn ratings_url(&self, name: &str, city: Option<&str>) -> Result<String, FinchError> {
        let mut url = Url::parse(&format!("{}/ratings", self.base_url))
            .map_err(|e| FinchError::Config(format!("bad ratings base url: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("name", name);
            if let Some(city) = city {
                pairs.append_pair("city", city);
            }
        }
        Ok(url.into())
    }
}

#[async_trait]
impl ToolBehavior for RestaurantRatingsTool {
    fn desc(&self) -> ToolDesc {
        ToolDescBuilder::new("restaurant_ratings")
            .description(
                "Look up health inspection scores and customer ratings for a \
                 restaurant by name, optionally narrowed to a city.",
            )
            .parameters(json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Restaurant name"
                    },
                    "city": {
                        "type": "string",
                        "description": "City to narrow the search to"
                    }
                },
                "required": ["name"]
            }))
            .build()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        let name = match string_arg(&args, "name") {
            Ok(name) => name,
            Err(error) => return Ok(error),
        };
        let city = args.get("city").and_then(|v| v.as_str()).map(str::trim).filter(|c| !c.is_empty());

        let url = self.ratings_url(&name, city)?;
        let body = self.api.get_json(&url).await?;
        let results = body["results"].as_array().cloned().unwrap_or_default();
        if results.is_empty() {
            return Ok(json!({
                "query": name,
                "results": [],
                "note": "no ratings found for this restaurant",
            }));
        }
        Ok(json!({ "query": name, "results": results }))
    }
}
