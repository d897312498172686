use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::citations::CitationNormalizer;
use super::researcher::ContextBlock;
use crate::error::WriterError;
use crate::llm::ChatModel;

const SYSTEM_PROMPT: &str = r#"You are an expert research assistant. Answer the user's query based *only* on the provided sources. Do not use any prior knowledge.

Instructions:
1. Read the user query and the provided sources.
2. Synthesize a comprehensive answer to the query.
3. You MUST cite the sources you use.
4. Cite sources using the format [1], [2], etc., based on the [Source n] tag.
5. If the sources do not contain enough information to answer the query, state that clearly.
6. Do not make up information.
7. Your answer must be in Markdown format."#;

const NO_SOURCES: &str = "No sources were found for this query. Say that you could not find relevant sources to answer it.";

/// Answer text with citations already normalized, one item per emitted chunk.
pub type ChunkStream = BoxStream<'static, Result<String, WriterError>>;

pub struct Writer {
    llm: Arc<dyn ChatModel>,
    model: String,
    /// Longest wait for the next delta from the provider.
    idle_timeout: Duration,
}

impl Writer {
    pub fn new(llm: Arc<dyn ChatModel>, model: String, idle_timeout: Duration) -> Self {
        Self {
            llm,
            model,
            idle_timeout,
        }
    }

    /// Start a fresh answer stream. Each call opens a new LLM stream; a
    /// partially consumed stream cannot be resumed.
    pub async fn write(&self, question: &str, context: &ContextBlock) -> Result<ChunkStream, WriterError> {
        let sources = if context.is_empty() {
            NO_SOURCES.to_string()
        } else {
            context.render()
        };
        let user_message = format!(
            "User Query: \"{}\"\n\nProvided Sources (Snippets):\n---\n{}\n---",
            question, sources
        );

        let mut upstream = self
            .llm
            .stream(&self.model, Some(SYSTEM_PROMPT), &user_message)
            .await
            .map_err(WriterError::Start)?;

        let source_count = context.len();
        let idle_timeout = self.idle_timeout;
        let chunks = async_stream::stream! {
            let mut normalizer = CitationNormalizer::new(source_count);
            let mut failure = None;

            loop {
                match timeout(idle_timeout, upstream.next()).await {
                    Ok(Some(Ok(delta))) => {
                        let ready = normalizer.push(&delta);
                        if !ready.is_empty() {
                            yield Ok(ready);
                        }
                    }
                    Ok(Some(Err(e))) => {
                        failure = Some(WriterError::Interrupted(e));
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        failure = Some(WriterError::Timeout(idle_timeout));
                        break;
                    }
                }
            }
            // Release the provider connection before flushing.
            drop(upstream);

            // Held-back text goes out before any failure.
            let rest = normalizer.finish();
            if !rest.is_empty() {
                yield Ok(rest);
            }
            if let Some(e) = failure {
                yield Err(e);
            }
        };

        Ok(Box::pin(chunks))
    }
}
