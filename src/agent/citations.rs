//! Rewrites loose citation markers such as `(1)` or `[2, 3]` into the
//! canonical `[k](#citation-k)` links the UI renders as source chips.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Longest trailing fragment held back while waiting for a marker to close.
const MAX_PENDING: usize = 256;

// Alternatives, tried left to right at each position:
//   a bracket list already followed by a link target (canonical or Markdown), kept as is
//   a bracket list `[1, 2]`
//   a parenthesized list `(1, 2)`
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[\s*\d+(?:\s*,\s*\d+)*\s*\]\([^)\s]*\)|\[\s*(\d+(?:\s*,\s*\d+)*)\s*\]|\(\s*(\d+(?:\s*,\s*\d+)*)\s*\)",
    )
    .expect("citation marker regex is valid")
});

static PARTIAL_BRACKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[\d\s,]*(?:\](?:\([^)\s]*)?)?$").expect("partial bracket regex is valid")
});

static PARTIAL_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([\d\s,]*$").expect("partial paren regex is valid"));

/// Normalize every citation marker in `text` whose numbers all fall in
/// `1..=source_count`. Other markers pass through untouched.
pub fn normalize_citations(text: &str, source_count: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in MARKER.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let followed_by = &text[whole.end()..];
        out.push_str(&rewrite_marker(&caps, followed_by, source_count));
        last = whole.end();
    }

    out.push_str(&text[last..]);
    out
}

fn rewrite_marker<'t>(caps: &Captures<'t>, followed_by: &str, source_count: usize) -> Cow<'t, str> {
    let original = caps.get(0).map_or("", |m| m.as_str());

    let list = match (caps.get(1), caps.get(2)) {
        // `[1](` is the start of a link whose target never closed
        (Some(_), _) if followed_by.starts_with('(') => return Cow::Borrowed(original),
        (Some(list), _) | (None, Some(list)) => list.as_str(),
        (None, None) => return Cow::Borrowed(original),
    };

    let numbers: Option<Vec<usize>> = list
        .split(',')
        .map(|n| n.trim().parse::<usize>().ok())
        .collect();

    match numbers {
        Some(numbers) if numbers.iter().all(|n| (1..=source_count).contains(n)) => Cow::Owned(
            numbers
                .iter()
                .map(|n| format!("[{n}](#citation-{n})"))
                .collect(),
        ),
        _ => Cow::Borrowed(original),
    }
}

/// Byte offset where a possibly unfinished marker starts at the end of `text`.
fn pending_start(text: &str) -> Option<usize> {
    if let Some(start) = text.rfind('[') {
        if text.len() - start <= MAX_PENDING && PARTIAL_BRACKET.is_match(&text[start..]) {
            return Some(start);
        }
    }
    let start = text.rfind('(')?;
    (text.len() - start <= MAX_PENDING && PARTIAL_PAREN.is_match(&text[start..])).then_some(start)
}

/// Applies [`normalize_citations`] to a stream of text deltas.
///
/// A marker may arrive split over several deltas, so a trailing fragment
/// that could still grow into one is held back until the next push or
/// [`finish`](Self::finish).
#[derive(Debug)]
pub struct CitationNormalizer {
    source_count: usize,
    pending: String,
}

impl CitationNormalizer {
    pub fn new(source_count: usize) -> Self {
        Self {
            source_count,
            pending: String::new(),
        }
    }

    /// Feed the next delta, returning the text that is safe to emit now.
    /// May be empty.
    pub fn push(&mut self, delta: &str) -> String {
        self.pending.push_str(delta);
        let split = pending_start(&self.pending).unwrap_or(self.pending.len());
        let ready: String = self.pending.drain(..split).collect();
        normalize_citations(&ready, self.source_count)
    }

    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        normalize_citations(&rest, self.source_count)
    }
}
