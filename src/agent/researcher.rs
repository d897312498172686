use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::join_all;

use crate::retrieval::{Snippet, WebSearch};

/// Numbered sources handed to the writer. Entry `i` is cited as `[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBlock {
    entries: Vec<Snippet>,
}

impl ContextBlock {
    pub fn new(entries: Vec<Snippet>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Snippet] {
        &self.entries
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, s) in self.entries.iter().enumerate() {
            let _ = write!(
                out,
                "[Source {}]\nURL: {}\nTitle: {}\nSnippet: {}\n\n",
                i + 1,
                s.url,
                s.title,
                s.text
            );
        }
        out
    }
}

pub struct Researcher {
    search: Arc<dyn WebSearch>,
    results_per_query: usize,
}

impl Researcher {
    pub fn new(search: Arc<dyn WebSearch>, results_per_query: usize) -> Self {
        Self {
            search,
            results_per_query,
        }
    }

    pub async fn research(&self, queries: &[String]) -> (ContextBlock, Vec<Snippet>) {
        // join_all keeps submission order, whichever search finishes first
        let results = join_all(
            queries
                .iter()
                .map(|q| self.search.search(q, self.results_per_query)),
        )
        .await;

        let sources = dedup_by_url(results.into_iter().flatten());
        tracing::info!(
            queries = queries.len(),
            unique_snippets = sources.len(),
            "Research finished"
        );

        (ContextBlock::new(sources.clone()), sources)
    }
}

/// Keep the first snippet seen for each url, in arrival order.
pub fn dedup_by_url(snippets: impl IntoIterator<Item = Snippet>) -> Vec<Snippet> {
    let mut seen = HashSet::new();
    snippets
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}
