pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod instrumentation;
pub mod llm;
pub mod retrieval;

use anyhow::Result;
use std::sync::Arc;

use agent::Orchestrator;
use config::{Config, LlmProvider, SearchProvider};
use llm::{AnthropicClient, ChatModel, LlmClient};
use retrieval::{DuckDuckGoHtmlSearch, DuckDuckGoSearch, WebSearch};

/// Wire the production clients described by `config` into an orchestrator.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let llm: Arc<dyn ChatModel> = match config.llm_provider {
        LlmProvider::OpenAi => Arc::new(LlmClient::new(&config.llm_api_key, &config.llm_base_url)),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            &config.llm_api_key,
            &config.llm_base_url,
        )),
    };
    let search: Arc<dyn WebSearch> = match config.search_provider {
        SearchProvider::Web => Arc::new(DuckDuckGoHtmlSearch::new(&config.search_base_url)?),
        SearchProvider::InstantAnswer => Arc::new(DuckDuckGoSearch::new(&config.search_base_url)?),
    };

    Ok(Orchestrator::new(llm, search, config.agent_settings()))
}
