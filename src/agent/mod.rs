pub mod citations;
pub mod events;
pub mod planner;
pub mod researcher;
pub mod writer;

use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::error::{PlannerError, ResearchError, WriterError};
use crate::instrumentation::RunLog;
use crate::llm::{ChatModel, LlmResponse};
use crate::retrieval::{Snippet, WebSearch};

pub use events::StreamEvent;
use planner::Planner;
use researcher::{ContextBlock, Researcher};
use writer::{ChunkStream, Writer};

pub type EventStream = BoxStream<'static, StreamEvent>;

/// Everything the workflow needs besides its clients.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub planner_model: String,
    pub writer_model: String,
    pub max_queries: usize,
    pub results_per_query: usize,
    pub planner_timeout: Duration,
    pub research_timeout: Duration,
    /// Bounds opening the writer stream and each wait for the next provider delta.
    pub writer_idle_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            planner_model: "google/gemini-2.0-flash-001".into(),
            writer_model: "google/gemini-2.0-flash-001".into(),
            max_queries: 3,
            results_per_query: 2,
            planner_timeout: Duration::from_secs(30),
            research_timeout: Duration::from_secs(30),
            writer_idle_timeout: Duration::from_secs(60),
        }
    }
}

enum Phase {
    Idle,
    Planning,
    Researching(Vec<String>),
    Writing(ChunkStream),
    Done,
    Failed { phase: &'static str, message: String },
}

/// Runs plan → research → write for one question at a time per stream.
///
/// Cheap to clone; clones share the same clients. Runs share no mutable
/// state, so one orchestrator serves every request.
#[derive(Clone)]
pub struct Orchestrator {
    planner: Arc<Planner>,
    researcher: Arc<Researcher>,
    writer: Arc<Writer>,
    settings: Arc<AgentSettings>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn ChatModel>, search: Arc<dyn WebSearch>, settings: AgentSettings) -> Self {
        Self {
            planner: Arc::new(Planner::new(
                llm.clone(),
                settings.planner_model.clone(),
                settings.max_queries,
            )),
            researcher: Arc::new(Researcher::new(search, settings.results_per_query)),
            writer: Arc::new(Writer::new(
                llm,
                settings.writer_model.clone(),
                settings.writer_idle_timeout,
            )),
            settings: Arc::new(settings),
        }
    }

    /// Stream the events of one run. Nothing happens until the stream is
    /// polled, and dropping it stops the run, including any in-flight LLM
    /// generation.
    pub fn run(&self, question: String) -> EventStream {
        let this = self.clone();

        let events = async_stream::stream! {
            let mut run = RunLog::start(&question);
            let mut write_started = None;
            let mut phase = Phase::Idle;

            loop {
                phase = match phase {
                    Phase::Idle => {
                        tracing::info!(run_id = %run.id, question = %question, "Workflow started");
                        yield StreamEvent::Trace("Planning...".to_string());
                        Phase::Planning
                    }
                    Phase::Planning => {
                        let started = Instant::now();
                        match this.plan(&question).await {
                            Ok((queries, response)) => {
                                tracing::info!(run_id = %run.id, ?queries, "Planned search queries");
                                run.record_plan(&queries, &response, started);
                                yield StreamEvent::Trace("Researching...".to_string());
                                Phase::Researching(queries)
                            }
                            Err(e) => Phase::Failed {
                                phase: "planning",
                                message: e.to_string(),
                            },
                        }
                    }
                    Phase::Researching(queries) => {
                        let started = Instant::now();
                        match this.research(&queries).await {
                            Ok((context, sources)) => {
                                run.record_research(sources.len(), started);
                                yield StreamEvent::Sources(sources);

                                write_started = Some(Instant::now());
                                match this.start_writer(&question, &context).await {
                                    Ok(chunks) => Phase::Writing(chunks),
                                    Err(e) => Phase::Failed {
                                        phase: "writing",
                                        message: e.to_string(),
                                    },
                                }
                            }
                            Err(e) => Phase::Failed {
                                phase: "research",
                                message: e.to_string(),
                            },
                        }
                    }
                    Phase::Writing(mut chunks) => match chunks.next().await {
                        Some(Ok(chunk)) => {
                            run.record_chunk(&chunk);
                            yield StreamEvent::Chunk(chunk);
                            Phase::Writing(chunks)
                        }
                        None => Phase::Done,
                        Some(Err(e)) => Phase::Failed {
                            phase: "writing",
                            message: e.to_string(),
                        },
                    },
                    Phase::Done => {
                        run.complete(write_started);
                        yield StreamEvent::Done;
                        break;
                    }
                    Phase::Failed { phase, message } => {
                        run.fail(phase, &message, write_started);
                        yield StreamEvent::Error(message);
                        break;
                    }
                };
            }
        };

        Box::pin(events)
    }

    async fn plan(&self, question: &str) -> Result<(Vec<String>, LlmResponse), PlannerError> {
        let limit = self.settings.planner_timeout;
        timeout(limit, self.planner.plan(question))
            .await
            .map_err(|_| PlannerError::Timeout(limit))?
    }

    async fn research(&self, queries: &[String]) -> Result<(ContextBlock, Vec<Snippet>), ResearchError> {
        let limit = self.settings.research_timeout;
        timeout(limit, self.researcher.research(queries))
            .await
            .map_err(|_| ResearchError::Timeout(limit))
    }

    async fn start_writer(&self, question: &str, context: &ContextBlock) -> Result<ChunkStream, WriterError> {
        let limit = self.settings.writer_idle_timeout;
        timeout(limit, self.writer.write(question, context))
            .await
            .map_err(|_| WriterError::Timeout(limit))?
    }
}
