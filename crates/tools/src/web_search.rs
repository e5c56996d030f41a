//! Internet search (WEB) over the DuckDuckGo instant-answer JSON API.
//!
//! Used for public information outside the local stores, such as recent
//! amendments or news. Results are title, snippet and link triples.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use zhifa_core::error::ToolError;
use zhifa_core::tool::{Tool, ToolStatus, tagged};

pub const NAME: &str = "WEB";

pub const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, max_results: usize, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            max_results: max_results.max(1),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }

        let body: InstantAnswer = response.json().await.map_err(|e| e.to_string())?;
        Ok(collect_results(body, self.max_results))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, 3, 15)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn title(&self) -> &str {
        "互联网搜索"
    }

    fn description(&self) -> &str {
        "需要本地知识库之外的最新公开信息时使用，例如最新的法律修正案、时事新闻或相关背景。\
         输入一个清晰的搜索问题。"
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        debug!(tool = NAME, max_results = self.max_results, "Searching the web");

        let results = match self.search(query).await {
            Ok(results) => results,
            Err(reason) => {
                warn!(tool = NAME, %reason, "Web search failed");
                return Ok(tagged(NAME, ToolStatus::Error, &format!("网络搜索失败: {reason}")));
            }
        };

        if results.is_empty() {
            return Ok(tagged(
                NAME,
                ToolStatus::NotFound,
                &format!("未找到与“{query}”相关的互联网信息。"),
            ));
        }

        Ok(tagged(NAME, ToolStatus::Success, &format_results(&results)))
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("标题: {}\n摘要: {}\n链接: {}", r.title, r.snippet, r.link))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

// --- Instant answer API types (internal) ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<RelatedTopic>,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn collect_results(answer: InstantAnswer, max_results: usize) -> Vec<SearchResult> {
    let mut out = Vec::new();

    if !answer.abstract_text.trim().is_empty() {
        out.push(SearchResult {
            title: answer.heading.trim().to_string(),
            snippet: answer.abstract_text.trim().to_string(),
            link: answer.abstract_url,
        });
    }

    fn flatten(topics: Vec<RelatedTopic>, out: &mut Vec<SearchResult>) {
        for topic in topics {
            match topic {
                RelatedTopic::Topic { text, first_url } if !text.trim().is_empty() => {
                    let text = text.trim();
                    let title = text.split(" - ").next().unwrap_or(text).to_string();
                    out.push(SearchResult {
                        title,
                        snippet: text.to_string(),
                        link: first_url,
                    });
                }
                RelatedTopic::Topic { .. } => {}
                RelatedTopic::Group { topics } => flatten(topics, out),
            }
        }
    }

    flatten(answer.results, &mut out);
    flatten(answer.related_topics, &mut out);
    out.truncate(max_results);
    out
}
