use serde::Serialize;

use crate::retrieval::Snippet;

/// One unit of the event stream a workflow run produces.
///
/// A successful run emits `trace`, `trace`, `sources`, any number of
/// `chunk`s and then `done`. A failed run ends with a single `error`
/// instead of `done`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Trace(String),
    Sources(Vec<Snippet>),
    Chunk(String),
    Error(String),
    Done,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Trace(_) => "trace",
            StreamEvent::Sources(_) => "sources",
            StreamEvent::Chunk(_) => "chunk",
            StreamEvent::Error(_) => "error",
            StreamEvent::Done => "done",
        }
    }

    /// Wire payload: raw text, a JSON array for sources, empty for done.
    pub fn data(&self) -> String {
        match self {
            StreamEvent::Trace(text) | StreamEvent::Chunk(text) | StreamEvent::Error(text) => {
                text.clone()
            }
            StreamEvent::Sources(snippets) => {
                serde_json::to_string(snippets).unwrap_or_else(|_| "[]".to_string())
            }
            StreamEvent::Done => String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error(_) | StreamEvent::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_payload_is_a_json_array() {
        let event = StreamEvent::Sources(vec![Snippet::new(
            "Paris",
            "https://example.com/paris",
            "Paris is the capital...",
        )]);
        assert_eq!(event.name(), "sources");
        assert_eq!(
            event.data(),
            r#"[{"title":"Paris","url":"https://example.com/paris","text":"Paris is the capital..."}]"#
        );
        assert_eq!(StreamEvent::Sources(vec![]).data(), "[]");
    }

    #[test]
    fn done_has_empty_payload() {
        assert_eq!(StreamEvent::Done.data(), "");
        assert!(StreamEvent::Done.is_terminal());
        assert!(!StreamEvent::Chunk("x".into()).is_terminal());
    }

    #[test]
    fn serializes_as_tagged_json() {
        let json = serde_json::to_string(&StreamEvent::Trace("Planning...".into())).unwrap();
        assert_eq!(json, r#"{"event":"trace","data":"Planning..."}"#);
        let done = serde_json::to_string(&StreamEvent::Done).unwrap();
        assert_eq!(done, r#"{"event":"done"}"#);
    }
}
