use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::ExternalApiSettings,
    error::FinchError,
    tool::{ToolBehavior, builtin::{ApiClient, string_arg}},
    value::{ToolDesc, ToolDescBuilder},
};

const MAX_MATCHES: usize = 5;

/// Banks can be found by name or, when known, directly by FDIC certificate
/// number.
#[derive(Clone, Debug)]
enum LookupQuery {
    Name(String),
    Cert(String),
}

impl std::fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupQuery::Name(name) => write!(f, "{name}"),
            LookupQuery::Cert(cert) => write!(f, "cert {cert}"),
        }
    }
}

/// Looks up FDIC-insured institutions by name through the FDIC BankFind API.
#[derive(Clone, Debug)]
pub struct BankLookupTool {
    api: ApiClient,
    base_url: String,
}

impl BankLookupTool {
    pub fn new(settings: &ExternalApiSettings, client: reqwest::Client) -> Self {
        Self {
            api: ApiClient::new(settings, "bank directory", client),
            base_url: settings.fdic_base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn search_url(&self, query: &LookupQuery) -> Result<String, FinchError> {
        let mut url = Url::parse(&format!("{}/institutions", self.base_url))
            .map_err(|e| FinchError::Config(format!("bad FDIC base url: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            match query {
                LookupQuery::Name(name) => {
                    pairs.append_pair("search", &format!("NAME:{name}"));
                }
                LookupQuery::Cert(cert) => {
                    pairs.append_pair("filters", &format!("CERT:{cert}"));
                }
            }
            pairs
                .append_pair("fields", "NAME,CERT,CITY,STNAME,ASSET,ACTIVE")
                .append_pair("limit", &MAX_MATCHES.to_string())
                .append_pair("format", "json");
        }
        Ok(url.into())
    }
}

#[async_trait]
impl ToolBehavior for BankLookupTool {
    fn desc(&self) -> ToolDesc {
        ToolDescBuilder::new("bank_lookup")
            .description(
                "Look up an FDIC-insured bank by name or certificate number. Returns \
                 certificate number, location, total assets and active status for the \
                 closest matches.",
            )
            .parameters(json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Full or partial institution name"
                    },
                    "cert": {
                        "type": "string",
                        "description": "FDIC certificate number, when already known"
                    }
                }
            }))
            .build()
    }

    async fn run(&self, args: Value) -> anyhow::Result<Value> {
        let query = match string_arg(&args, "cert") {
            Ok(cert) => LookupQuery::Cert(cert),
            Err(_) => match string_arg(&args, "name") {
                Ok(name) => LookupQuery::Name(name),
                Err(_) => {
                    return Ok(json!({
                        "error": "provide either 'name' or 'cert'",
                    }));
                }
            },
        };
        let url = self.search_url(&query)?;
        let body = self.api.get_json(&url).await?;

        let matches: Vec<Value> = body["data"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("data"))
                    .map(|inst| {
                        json!({
                            "name": inst["NAME"],
                            "cert": inst["CERT"],
                            "city": inst["CITY"],
                            "state": inst["STNAME"],
                            "total_assets_thousands": inst["ASSET"],
                            "active": inst["ACTIVE"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if matches.is_empty() {
            return Ok(json!({
                "query": query.to_string(),
                "matches": [],
                "note": "no matching institutions",
            }));
        }
        Ok(json!({ "query": query.to_string(), "matches": matches }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_query() {
        let tool = BankLookupTool::new(&ExternalApiSettings::default(), reqwest::Client::new());
        let by_name = tool
            .search_url(&LookupQuery::Name("First National".to_owned()))
            .unwrap();
        assert!(by_name.starts_with("https://banks.data.fdic.gov/api/institutions?"));
        assert!(by_name.contains("NAME%3AFirst+National") || by_name.contains("NAME:First+National"));
        assert!(by_name.contains("limit=5"));

        let by_cert = tool.search_url(&LookupQuery::Cert("3511".to_owned())).unwrap();
        assert!(by_cert.contains("filters=CERT%3A3511") || by_cert.contains("filters=CERT:3511"));
    }

    #[tokio::test]
    async fn missing_arguments_are_a_tool_level_error() -> anyhow::Result<()> {
        let tool = BankLookupTool::new(&ExternalApiSettings::default(), reqwest::Client::new());
        let out = tool.run(json!({})).await?;
        assert!(out["error"].as_str().unwrap().contains("name"));
        Ok(())
    }
}
