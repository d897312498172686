use std::sync::Arc;

use crate::error::PlannerError;
use crate::llm::{ChatModel, LlmResponse};

const SYSTEM_PROMPT: &str = r#"You are an expert search query planner. Given a user's question, write 2-3 concise web search queries that together will find the information needed to answer it. Each query should target a different aspect of the question.

Respond with ONLY a JSON array of query strings. Example:
["query 1", "query 2", "query 3"]

Do not include any other text, explanation, or formatting."#;

pub struct Planner {
    llm: Arc<dyn ChatModel>,
    model: String,
    max_queries: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn ChatModel>, model: String, max_queries: usize) -> Self {
        Self {
            llm,
            model,
            max_queries,
        }
    }

    pub async fn plan(&self, question: &str) -> Result<(Vec<String>, LlmResponse), PlannerError> {
        let response = self
            .llm
            .complete(&self.model, Some(SYSTEM_PROMPT), question)
            .await?;

        tracing::debug!(raw = %response.text, "Planner response");

        let queries = parse_queries(&response.text, self.max_queries)?;
        if queries.len() < 2 {
            tracing::warn!(count = queries.len(), "Planner returned fewer queries than asked");
        }

        Ok((queries, response))
    }
}

/// Extract the query list from a planner reply, tolerating Markdown fences
/// and chatter around the JSON array.
pub fn parse_queries(text: &str, max_queries: usize) -> Result<Vec<String>, PlannerError> {
    let cleaned = text.trim().replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let parsed: Vec<String> = match serde_json::from_str(cleaned) {
        Ok(parsed) => parsed,
        Err(e) => {
            let embedded = match (cleaned.find('['), cleaned.rfind(']')) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&cleaned[start..=end]).ok()
                }
                _ => None,
            };
            embedded.ok_or_else(|| PlannerError::Unparseable(format!("{e}: {}", preview(cleaned))))?
        }
    };

    let queries: Vec<String> = parsed
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(max_queries)
        .collect();

    if queries.is_empty() {
        return Err(PlannerError::NoQueries);
    }
    Ok(queries)
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}
