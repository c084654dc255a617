//! What gets pulled out of a visited page.
//!
//! The row processor is generic over [`PageExtractor`]; any
//! `Fn(&LoadedPage) -> anyhow::Result<String>` closure can be plugged in, and
//! [`TitleExtractor`] / [`AgentQlExtractor`] are the two shipped with the binary.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{types::LoadedPage, utils::truncate_chars};

pub const AGENTQL_URL: &str = "https://api.agentql.com/v1/query-data";
pub const PAGE_QUERY: &str = r#"
{
    page_title
    main_content
}
"#;
const CONTENT_PREVIEW_LEN: usize = 100;

#[async_trait(?Send)]
pub trait PageExtractor {
    async fn extract(&self, page: &LoadedPage) -> Result<String>;
}

#[async_trait(?Send)]
impl<F> PageExtractor for F
where
    F: Fn(&LoadedPage) -> Result<String>,
{
    async fn extract(&self, page: &LoadedPage) -> Result<String> {
        self(page)
    }
}

/// Page title plus the start of the visible text.
#[derive(Debug, Default, Clone)]
pub struct TitleExtractor;

#[async_trait(?Send)]
impl PageExtractor for TitleExtractor {
    async fn extract(&self, page: &LoadedPage) -> Result<String> {
        Ok(summarize(&page.title, &page.text))
    }
}

fn summarize(title: &str, content: &str) -> String {
    let title = title.trim();
    let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if content.is_empty() {
        return title.to_string();
    }
    format!(
        "Title: {} | Content: {}...",
        if title.is_empty() { "N/A" } else { title },
        truncate_chars(&content, CONTENT_PREVIEW_LEN)
    )
}

#[derive(Serialize)]
struct QueryDataRequest<'a> {
    query: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct QueryDataResponse {
    #[serde(default)]
    data: Value,
}

/// Sends the page html to AgentQL's query-data endpoint. If the call fails the
/// page title is used instead, so a flaky api does not fail the row.
pub struct AgentQlExtractor {
    client: Client,
    api_key: String,
    url: String,
    query: String,
}

impl AgentQlExtractor {
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(anyhow!("AGENTQL_API_KEY is missing"));
        }
        Ok(AgentQlExtractor {
            client: Client::new(),
            api_key: api_key.into(),
            url: AGENTQL_URL.into(),
            query: PAGE_QUERY.into(),
        })
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.into();
        self
    }

    /// Points the extractor at another query-data endpoint.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.into();
        self
    }

    async fn query(&self, page: &LoadedPage) -> Result<Value> {
        let res = self
            .client
            .post(&self.url)
            .header("X-API-Key", &self.api_key)
            .json(&QueryDataRequest {
                query: &self.query,
                html: &page.html,
            })
            .send()
            .await
            .context("agentql request failed")?;

        if res.status() != StatusCode::OK {
            return Err(anyhow!(
                "agentql status:{}, error: {}",
                res.status(),
                res.text().await?
            ));
        }
        Ok(res.json::<QueryDataResponse>().await?.data)
    }
}

#[async_trait(?Send)]
impl PageExtractor for AgentQlExtractor {
    async fn extract(&self, page: &LoadedPage) -> Result<String> {
        match self.query(page).await {
            Ok(data) => Ok(format_agentql(&data, &page.title)),
            Err(e) => {
                warn!("agentql query failed, using page title: {}", e);
                Ok(page.title.clone())
            }
        }
    }
}

fn format_agentql(data: &Value, fallback_title: &str) -> String {
    let field = |name: &str| match data.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let title = field("page_title");
    let title = if title.is_empty() {
        fallback_title.to_string()
    } else {
        title
    };
    let content = field("main_content");
    format!(
        "Title: {} | Content: {}...",
        if title.is_empty() { "N/A".into() } else { title },
        truncate_chars(&content, CONTENT_PREVIEW_LEN)
    )
}

/// The extractors selectable from the command line.
pub enum BuiltinExtractor {
    Title(TitleExtractor),
    AgentQl(AgentQlExtractor),
}

#[async_trait(?Send)]
impl PageExtractor for BuiltinExtractor {
    async fn extract(&self, page: &LoadedPage) -> Result<String> {
        match self {
            BuiltinExtractor::Title(e) => e.extract(page).await,
            BuiltinExtractor::AgentQl(e) => e.extract(page).await,
        }
    }
}
