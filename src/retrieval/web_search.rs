use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{Snippet, WebSearch};

pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// DuckDuckGo instant-answer API. Needs no API key.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
}

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
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

/// Either a plain topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Topic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<Topic>,
    },
    Entry {
        #[serde(default, rename = "Text")]
        text: String,
        #[serde(default, rename = "FirstURL")]
        first_url: String,
    },
}

impl DuckDuckGoSearch {
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
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search provider returned an error status")?;

        // The API answers with a JavaScript content type, so decode by hand.
        let body = response
            .text()
            .await
            .context("Failed to read search response")?;
        let answer: InstantAnswer =
            serde_json::from_str(&body).context("Failed to parse search response")?;

        Ok(snippets_from_answer(answer, limit))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet> {
        tracing::debug!(query, limit, "Searching snippets");

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
                tracing::warn!(query, error = %format!("{:#}", e), "Snippet search failed");
                Vec::new()
            }
        }
    }
}

fn snippets_from_answer(answer: InstantAnswer, limit: usize) -> Vec<Snippet> {
    let mut snippets = Vec::new();

    if !answer.abstract_text.is_empty() && !answer.abstract_url.is_empty() {
        let title = if answer.heading.is_empty() {
            "No Title".to_string()
        } else {
            answer.heading
        };
        snippets.push(Snippet::new(title, answer.abstract_url, answer.abstract_text));
    }

    let mut topics: Vec<Topic> = answer.results;
    topics.extend(answer.related_topics);
    collect_topics(topics, &mut snippets);

    snippets.truncate(limit);
    snippets
}

fn collect_topics(topics: Vec<Topic>, out: &mut Vec<Snippet>) {
    for topic in topics {
        match topic {
            Topic::Entry { text, first_url } => {
                if text.is_empty() || first_url.is_empty() {
                    continue;
                }
                // Topic text reads "Title - description"
                let title = text
                    .split_once(" - ")
                    .map(|(title, _)| title.to_string())
                    .unwrap_or_else(|| text.clone());
                out.push(Snippet::new(title, first_url, text));
            }
            Topic::Group { topics } => collect_topics(topics, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: &str = r#"{
        "Heading": "Paris",
        "AbstractText": "Paris is the capital and largest city of France.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Paris",
        "Results": [],
        "RelatedTopics": [
            {"Text": "Île-de-France - Region surrounding Paris.", "FirstURL": "https://duckduckgo.com/Ile-de-France"},
            {"Name": "Culture", "Topics": [
                {"Text": "Louvre - Art museum in Paris.", "FirstURL": "https://duckduckgo.com/Louvre"}
            ]},
            {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
        ]
    }"#;

    #[test]
    fn abstract_comes_first_then_topics() {
        let answer: InstantAnswer = serde_json::from_str(PARIS).unwrap();
        let snippets = snippets_from_answer(answer, 10);

        let urls: Vec<&str> = snippets.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://en.wikipedia.org/wiki/Paris",
                "https://duckduckgo.com/Ile-de-France",
                "https://duckduckgo.com/Louvre",
            ]
        );
        assert_eq!(snippets[0].title, "Paris");
        assert_eq!(snippets[2].title, "Louvre");
        assert_eq!(snippets[2].text, "Louvre - Art museum in Paris.");
    }

    #[test]
    fn respects_limit() {
        let answer: InstantAnswer = serde_json::from_str(PARIS).unwrap();
        assert_eq!(snippets_from_answer(answer, 2).len(), 2);
    }

    #[test]
    fn empty_answer_yields_nothing() {
        let answer: InstantAnswer = serde_json::from_str(r#"{"Heading": "", "RelatedTopics": []}"#).unwrap();
        assert!(snippets_from_answer(answer, 5).is_empty());
    }

    #[tokio::test]
    async fn unreachable_provider_returns_empty() {
        let search = DuckDuckGoSearch::new("http://127.0.0.1:9/").unwrap();
        assert!(search.search("anything", 3).await.is_empty());
    }
}
