use serde::Serialize;
use std::time::Instant;

use crate::llm::LlmResponse;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Outcome {
    Running,
    Completed,
    Failed { phase: String, message: String },
    /// The event stream was dropped before a terminal event.
    Cancelled,
}

/// Summary of one workflow run. Lives for the duration of the request and is
/// emitted as one structured log event when the run ends, or when it is
/// dropped while still running.
#[derive(Debug, Serialize)]
pub struct RunLog {
    pub id: String,
    pub timestamp: String,
    pub question: String,
    pub queries: Vec<String>,
    pub num_sources: usize,
    pub num_chunks: usize,
    pub answer_chars: usize,
    pub plan_latency_ms: u64,
    pub plan_input_tokens: u32,
    pub plan_output_tokens: u32,
    pub plan_cost: f64,
    pub research_latency_ms: u64,
    pub write_latency_ms: u64,
    pub total_latency_ms: u64,
    pub outcome: Outcome,
    #[serde(skip)]
    started: Option<Instant>,
}

impl RunLog {
    pub fn start(question: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            question: question.to_string(),
            queries: Vec::new(),
            num_sources: 0,
            num_chunks: 0,
            answer_chars: 0,
            plan_latency_ms: 0,
            plan_input_tokens: 0,
            plan_output_tokens: 0,
            plan_cost: 0.0,
            research_latency_ms: 0,
            write_latency_ms: 0,
            total_latency_ms: 0,
            outcome: Outcome::Running,
            started: Some(Instant::now()),
        }
    }

    pub fn record_plan(&mut self, queries: &[String], response: &LlmResponse, started: Instant) {
        self.queries = queries.to_vec();
        self.plan_latency_ms = started.elapsed().as_millis() as u64;
        self.plan_input_tokens = response.input_tokens;
        self.plan_output_tokens = response.output_tokens;
        self.plan_cost = response.cost;
    }

    pub fn record_research(&mut self, num_sources: usize, started: Instant) {
        self.num_sources = num_sources;
        self.research_latency_ms = started.elapsed().as_millis() as u64;
    }

    pub fn record_chunk(&mut self, chunk: &str) {
        self.num_chunks += 1;
        self.answer_chars += chunk.chars().count();
    }

    pub fn complete(&mut self, write_started: Option<Instant>) {
        self.close(write_started, Outcome::Completed);
    }

    pub fn fail(&mut self, phase: &str, message: &str, write_started: Option<Instant>) {
        self.close(
            write_started,
            Outcome::Failed {
                phase: phase.to_string(),
                message: message.to_string(),
            },
        );
    }

    /// Mark a run that stopped without a terminal event. No-op once closed.
    pub fn cancel(&mut self) {
        if self.outcome == Outcome::Running {
            self.close(None, Outcome::Cancelled);
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn close(&mut self, write_started: Option<Instant>, outcome: Outcome) {
        if let Some(started) = write_started {
            self.write_latency_ms = started.elapsed().as_millis() as u64;
        }
        if let Some(started) = self.started {
            self.total_latency_ms = started.elapsed().as_millis() as u64;
        }
        self.outcome = outcome;

        let summary = self.summary();
        let run = self.to_json();
        match &self.outcome {
            Outcome::Failed { phase, message } => tracing::warn!(
                run_id = %self.id,
                timestamp = %self.timestamp,
                question = %self.question,
                queries = ?self.queries,
                num_sources = self.num_sources,
                total_latency_ms = self.total_latency_ms,
                phase = %phase,
                error = %message,
                run = %run,
                "{}",
                summary
            ),
            outcome => tracing::info!(
                run_id = %self.id,
                timestamp = %self.timestamp,
                question = %self.question,
                queries = ?self.queries,
                num_sources = self.num_sources,
                num_chunks = self.num_chunks,
                total_latency_ms = self.total_latency_ms,
                outcome = ?outcome,
                run = %run,
                "{}",
                summary
            ),
        }
    }

    pub fn summary(&self) -> String {
        let status = match &self.outcome {
            Outcome::Running => "running".to_string(),
            Outcome::Completed => "completed".to_string(),
            Outcome::Failed { phase, .. } => format!("failed in {}", phase),
            Outcome::Cancelled => "cancelled".to_string(),
        };
        format!(
            "Run {} | Queries: {} | Sources: {} | Chunks: {} | Plan: {}ms | Research: {}ms | Write: {}ms | Total: {:.1}s | Plan tokens: {} | Cost: ${:.4}",
            status,
            self.queries.len(),
            self.num_sources,
            self.num_chunks,
            self.plan_latency_ms,
            self.research_latency_ms,
            self.write_latency_ms,
            self.total_latency_ms as f64 / 1000.0,
            self.plan_input_tokens + self.plan_output_tokens,
            self.plan_cost,
        )
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.cancel();
    }
}
