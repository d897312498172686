pub mod html_search;
pub mod web_search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use html_search::DuckDuckGoHtmlSearch;
pub use web_search::DuckDuckGoSearch;

/// A citable search result. `url` identifies it within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub url: String,
    pub text: String,
}

impl Snippet {
    pub fn new(title: impl Into<String>, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            text: text.into(),
        }
    }
}

/// Snippet search provider.
///
/// Never fails: provider errors are logged and reported as no results, so a
/// single bad query cannot sink a research phase.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet>;
}
