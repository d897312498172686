use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;

use super::{Snippet, WebSearch};

pub const DEFAULT_HTML_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

static RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.result").expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid selector"));

/// DuckDuckGo's HTML results page: ordinary web results (title, link, body)
/// for any query, where the instant-answer API only covers named entities.
#[derive(Debug, Clone)]
pub struct DuckDuckGoHtmlSearch {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoHtmlSearch {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("insight-search/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create search HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    async fn try_search(&self, query: &str, limit: usize) -> Result<Vec<Snippet>> {
        let html = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search provider returned an error status")?
            .text()
            .await
            .context("Failed to read search response")?;

        Ok(snippets_from_html(&html, limit))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoHtmlSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet> {
        tracing::debug!(query, limit, "Searching web results");

        match self.try_search(query, limit).await {
            Ok(snippets) if snippets.is_empty() => {
                tracing::info!(query, "No results from search provider");
                snippets
            }
            Ok(snippets) => {
                tracing::debug!(query, found = snippets.len(), "Search finished");
                snippets
            }
            Err(e) => {
                tracing::warn!(query, error = %format!("{:#}", e), "Web search failed");
                Vec::new()
            }
        }
    }
}

fn snippets_from_html(html: &str, limit: usize) -> Vec<Snippet> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT)
        .filter(|result| !result.value().classes().any(|c| c == "result--ad"))
        .filter_map(|result| {
            let link = result.select(&TITLE).next()?;
            let url = result_url(link.value().attr("href")?)?;
            let title = element_text(link);
            let body = result.select(&BODY).next().map(element_text)?;
            if body.is_empty() {
                return None;
            }
            let title = if title.is_empty() { "No Title".to_string() } else { title };
            Some(Snippet::new(title, url, body))
        })
        .take(limit)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result links go through a `/l/?uddg=<target>` redirect; unwrap it.
fn result_url(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };
    let url = reqwest::Url::parse(&absolute).ok()?;

    if url.path() == "/l/" {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
