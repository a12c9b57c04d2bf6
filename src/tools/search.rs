//! Web search tool backed by the Tavily API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Result, ZeolithError};
use crate::session::Conversation;

use super::Tool;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: u32 = 5;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Searches the web through the Tavily AI search engine.
pub struct TavilySearchTool {
    api_key: String,
    client: Client,
}

impl TavilySearchTool {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    fn format_results(results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "No search results found.".to_string();
        }

        results
            .iter()
            .map(|r| {
                format!(
                    "Title: {}\nURL: {}\nContent Snippet: {}\n---",
                    r.title, r.url, r.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Searches the web for a given query using the Tavily AI search engine. \
         Good for finding real-time or specific information."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to look up on the web. Be specific and descriptive."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _conversation: &mut Conversation) -> Result<String> {
        let query = super::required_str(&args, "query")?;
        info!(query, "Running web search");

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            max_results: MAX_RESULTS,
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZeolithError::Tool(format!(
                "Tavily search returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(Self::format_results(&parsed.results))
    }
}
