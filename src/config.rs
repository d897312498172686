use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::agent::AgentSettings;
use crate::llm::anthropic::DEFAULT_ANTHROPIC_URL;
use crate::retrieval::html_search::DEFAULT_HTML_SEARCH_URL;
use crate::retrieval::web_search::DEFAULT_SEARCH_URL;

const DEFAULT_OPENAI_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
    Anthropic,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openrouter" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => bail!("Unsupported LLM_PROVIDER: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    /// DuckDuckGo HTML results page: general web results.
    Web,
    /// DuckDuckGo instant-answer API: entity abstracts and related topics.
    InstantAnswer,
}

impl FromStr for SearchProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" | "html" => Ok(Self::Web),
            "instant" | "instant_answer" => Ok(Self::InstantAnswer),
            other => bail!("Unsupported SEARCH_PROVIDER: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub planner_model: String,
    pub writer_model: String,
    pub search_provider: SearchProvider,
    pub search_base_url: String,
    pub results_per_query: usize,
    pub max_queries: usize,
    pub planner_timeout_secs: u64,
    pub research_timeout_secs: u64,
    pub writer_idle_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let llm_provider: LlmProvider = var("LLM_PROVIDER", "openai").parse()?;
        let default_url = match llm_provider {
            LlmProvider::OpenAi => DEFAULT_OPENAI_URL,
            LlmProvider::Anthropic => DEFAULT_ANTHROPIC_URL,
        };

        let search_provider: SearchProvider = var("SEARCH_PROVIDER", "web").parse()?;
        let default_search_url = match search_provider {
            SearchProvider::Web => DEFAULT_HTML_SEARCH_URL,
            SearchProvider::InstantAnswer => DEFAULT_SEARCH_URL,
        };

        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(port = %raw, "Invalid PORT, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }),
        };

        Ok(Self {
            llm_provider,
            llm_api_key: lookup("LLM_API_KEY").context("LLM_API_KEY must be set")?,
            llm_base_url: var("LLM_BASE_URL", default_url),
            planner_model: var("PLANNER_MODEL", DEFAULT_MODEL),
            writer_model: var("WRITER_MODEL", DEFAULT_MODEL),
            search_provider,
            search_base_url: var("SEARCH_BASE_URL", default_search_url),
            results_per_query: positive(&var("RESULTS_PER_QUERY", "2"), "RESULTS_PER_QUERY")?,
            max_queries: positive(&var("MAX_QUERIES", "3"), "MAX_QUERIES")?,
            planner_timeout_secs: positive(&var("PLANNER_TIMEOUT_SECS", "30"), "PLANNER_TIMEOUT_SECS")?,
            research_timeout_secs: positive(&var("RESEARCH_TIMEOUT_SECS", "30"), "RESEARCH_TIMEOUT_SECS")?,
            writer_idle_timeout_secs: positive(&var("WRITER_IDLE_TIMEOUT_SECS", "60"), "WRITER_IDLE_TIMEOUT_SECS")?,
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            host: var("HOST", "0.0.0.0"),
            port,
        })
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            planner_model: self.planner_model.clone(),
            writer_model: self.writer_model.clone(),
            max_queries: self.max_queries,
            results_per_query: self.results_per_query,
            planner_timeout: Duration::from_secs(self.planner_timeout_secs),
            research_timeout: Duration::from_secs(self.research_timeout_secs),
            writer_idle_timeout: Duration::from_secs(self.writer_idle_timeout_secs),
        }
    }
}

/// Counts and deadlines where zero would make every run fail.
fn positive<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: T = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number", key))?;
    if value == T::default() {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_only_api_key() {
        let config = Config::from_lookup(lookup(&[("LLM_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::OpenAi);
        assert_eq!(config.llm_base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.search_provider, SearchProvider::Web);
        assert_eq!(config.search_base_url, DEFAULT_HTML_SEARCH_URL);
        assert_eq!(config.results_per_query, 2);
        assert_eq!(config.max_queries, 3);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.port, 8000);

        let settings = config.agent_settings();
        assert_eq!(settings.planner_timeout, Duration::from_secs(30));
        assert_eq!(settings.writer_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("LLM_API_KEY"));
    }

    #[test]
    fn anthropic_provider_switches_default_url() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "key"),
            ("LLM_PROVIDER", "Anthropic"),
        ]))
        .unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Anthropic);
        assert_eq!(config.llm_base_url, DEFAULT_ANTHROPIC_URL);
    }

    #[test]
    fn instant_answer_provider_switches_default_search_url() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "key"),
            ("SEARCH_PROVIDER", "instant"),
        ]))
        .unwrap();
        assert_eq!(config.search_provider, SearchProvider::InstantAnswer);
        assert_eq!(config.search_base_url, DEFAULT_SEARCH_URL);

        assert!(Config::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("SEARCH_PROVIDER", "bing")])).is_err());
    }

    #[test]
    fn parses_origin_list_and_falls_back_on_bad_port() {
        let config = Config::from_lookup(lookup(&[
            ("LLM_API_KEY", "key"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, https://insight.example.com,"),
            ("PORT", "eighty"),
        ]))
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["http://localhost:3000", "https://insight.example.com"]
        );
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn rejects_bad_numbers_and_providers() {
        assert!(Config::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("MAX_QUERIES", "many")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("LLM_PROVIDER", "gemini")])).is_err());
    }

    #[test]
    fn rejects_zero_counts_and_deadlines() {
        for key in [
            "MAX_QUERIES",
            "RESULTS_PER_QUERY",
            "PLANNER_TIMEOUT_SECS",
            "RESEARCH_TIMEOUT_SECS",
            "WRITER_IDLE_TIMEOUT_SECS",
        ] {
            let err = Config::from_lookup(lookup(&[("LLM_API_KEY", "k"), (key, "0")])).unwrap_err();
            assert_eq!(err.to_string(), format!("{} must be greater than zero", key));
        }

        let config = Config::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("MAX_QUERIES", " 1 ")])).unwrap();
        assert_eq!(config.max_queries, 1);
    }
}
