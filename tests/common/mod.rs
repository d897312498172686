#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insight_search::agent::{AgentSettings, Orchestrator, StreamEvent};
use insight_search::llm::{ChatModel, LlmError, LlmResponse, TextStream};
use insight_search::retrieval::{Snippet, WebSearch};

pub enum PlanReply {
    Text(String),
    Fail(String),
    Hang,
}

/// How the fake writer stream behaves.
#[derive(Clone, Default)]
pub struct AnswerScript {
    pub deltas: Vec<String>,
    pub fail_at_start: bool,
    /// Yield an error instead of the delta at this index.
    pub fail_at: Option<usize>,
    /// Stop producing (without ending) before the delta at this index.
    pub hang_at: Option<usize>,
}

impl AnswerScript {
    pub fn deltas(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Sets its flag when the owning stream is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedModel {
    plan: PlanReply,
    answer: AnswerScript,
    pub writer_prompts: Mutex<Vec<String>>,
    pub stream_dropped: Arc<AtomicBool>,
}

impl ScriptedModel {
    pub fn new(plan: PlanReply, answer: AnswerScript) -> Self {
        Self {
            plan,
            answer,
            writer_prompts: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn planning(queries: &[&str], answer: AnswerScript) -> Self {
        let json = serde_json::to_string(queries).unwrap();
        Self::new(PlanReply::Text(json), answer)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        _model: &str,
        _system_prompt: Option<&str>,
        _user_message: &str,
    ) -> Result<LlmResponse, LlmError> {
        match &self.plan {
            PlanReply::Text(text) => Ok(LlmResponse {
                text: text.clone(),
                input_tokens: 20,
                output_tokens: 10,
                cost: 0.0,
            }),
            PlanReply::Fail(body) => Err(LlmError::Api {
                status: 500,
                body: body.clone(),
            }),
            PlanReply::Hang => std::future::pending().await,
        }
    }

    async fn stream(
        &self,
        _model: &str,
        _system_prompt: Option<&str>,
        user_message: &str,
    ) -> Result<TextStream, LlmError> {
        self.writer_prompts
            .lock()
            .unwrap()
            .push(user_message.to_string());

        let script = self.answer.clone();
        if script.fail_at_start {
            return Err(LlmError::Api {
                status: 503,
                body: "model overloaded".into(),
            });
        }

        let guard = DropFlag(self.stream_dropped.clone());
        let stream = async_stream::stream! {
            let _guard = guard;
            for (i, delta) in script.deltas.into_iter().enumerate() {
                if script.hang_at == Some(i) {
                    std::future::pending::<()>().await;
                }
                if script.fail_at == Some(i) {
                    yield Err(LlmError::Stream("connection reset".into()));
                    break;
                }
                yield Ok(delta);
            }
        };
        Ok(Box::pin(stream))
    }
}

#[derive(Default)]
pub struct FakeSearch {
    results: HashMap<String, Vec<Snippet>>,
    delays: HashMap<String, Duration>,
    hang: bool,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, snippets: Vec<Snippet>) -> Self {
        self.results.insert(query.to_string(), snippets);
        self
    }

    pub fn delayed(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet> {
        self.calls.lock().unwrap().push((query.to_string(), limit));
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        let mut snippets = self.results.get(query).cloned().unwrap_or_default();
        snippets.truncate(limit);
        snippets
    }
}

pub fn paris() -> Snippet {
    Snippet::new(
        "Paris",
        "https://example.com/paris",
        "Paris is the capital...",
    )
}

pub fn settings() -> AgentSettings {
    AgentSettings {
        planner_timeout: Duration::from_secs(5),
        research_timeout: Duration::from_secs(5),
        writer_idle_timeout: Duration::from_secs(5),
        ..AgentSettings::default()
    }
}

pub fn orchestrator(model: Arc<ScriptedModel>, search: Arc<FakeSearch>) -> Orchestrator {
    Orchestrator::new(model, search, settings())
}

pub async fn collect(orchestrator: &Orchestrator, question: &str) -> Vec<StreamEvent> {
    orchestrator.run(question.to_string()).collect().await
}

pub fn answer_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
