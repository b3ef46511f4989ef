// ============================================================================
// File: src/stream.rs
// Folds the line-delimited answer stream into session state
// ============================================================================

use futures_util::{Stream, StreamExt};
use serde_json::json;
use std::time::{Duration, Instant};

use crate::citation::link_citations;
use crate::debug_log::kind;
use crate::models::{Reference, StreamEvent};
use crate::session::SessionState;

/// Literal line that ends the response stream
pub const DONE_SENTINEL: &str = "[done]";

const DATA_PREFIX: &str = "data:";
const PREVIEW_CHARS: usize = 100;

/// Receives display updates while a search streams in.
pub trait StreamSink {
    /// Called once, when the first answer fragment arrives.
    fn first_token(&mut self) {}

    /// Full answer so far, with citations linked against the known references.
    fn answer_updated(&mut self, rendered: &str);

    fn keywords_received(&mut self, _keywords: &[String]) {}

    fn references_received(&mut self, _references: &[Reference]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// What a single line did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    Applied,
    Malformed,
    Finished,
    /// The reducer was not streaming; the line was dropped.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Sentinel,
    EndOfBody,
}

pub struct StreamReducer {
    phase: StreamPhase,
    diagnostics: bool,
    dispatched_at: Option<Instant>,
    first_token_seen: bool,
    elapsed_reported: bool,
}

impl StreamReducer {
    pub fn new(diagnostics: bool) -> Self {
        Self {
            phase: StreamPhase::Idle,
            diagnostics,
            dispatched_at: None,
            first_token_seen: false,
            elapsed_reported: false,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Idle -> Streaming. Call right before the request is sent.
    pub fn begin(&mut self, question: &str, session: &mut SessionState) {
        session.reset_search(question);
        self.phase = StreamPhase::Streaming;
        self.dispatched_at = Some(Instant::now());
        self.first_token_seen = false;
        self.elapsed_reported = false;
    }

    pub fn apply_line(
        &mut self,
        line: &str,
        session: &mut SessionState,
        sink: &mut dyn StreamSink,
    ) -> LineOutcome {
        if self.phase != StreamPhase::Streaming {
            return LineOutcome::Ignored;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Blank;
        }

        let payload = strip_data_prefix(trimmed);
        if is_sentinel(trimmed) || is_sentinel(payload) {
            self.phase = StreamPhase::Completed;
            return LineOutcome::Finished;
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => {
                self.merge(event, session, sink);
                LineOutcome::Applied
            }
            Err(e) => {
                if self.diagnostics {
                    session.debug_log.append(
                        kind::PARSE_ERROR,
                        format!("Skipping malformed stream line: {}", e),
                        Some(json!({ "line": preview(trimmed) })),
                    );
                }
                LineOutcome::Malformed
            }
        }
    }

    fn merge(&mut self, event: StreamEvent, session: &mut SessionState, sink: &mut dyn StreamSink) {
        let mut rerender = false;

        if let Some(prompt) = event.prompt.filter(|p| !p.is_empty()) {
            if session.prompt.is_none() {
                if self.diagnostics {
                    session.debug_log.append(
                        kind::STREAM,
                        "Prompt received",
                        Some(json!({ "preview": preview(&prompt), "chars": prompt.chars().count() })),
                    );
                }
                session.debug_log.save_prompt(prompt.as_str());
                session.prompt = Some(prompt);
            }
        }

        if let Some(keywords) = event.keywords.filter(|k| !k.is_empty()) {
            if session.keywords.is_none() {
                if self.diagnostics {
                    session.debug_log.append(
                        kind::STREAM,
                        format!("Keywords received: {}", keywords.join(", ")),
                        Some(json!({ "keywords": keywords })),
                    );
                }
                sink.keywords_received(&keywords);
                session.keywords = Some(keywords);
            }
        }

        if let Some(references) = event.references.filter(|r| !r.is_empty()) {
            if session.references.is_none() {
                if self.diagnostics {
                    session.debug_log.append(
                        kind::STREAM,
                        format!("References received: {}", references.len()),
                        Some(json!({ "count": references.len() })),
                    );
                }
                sink.references_received(&references);
                session.references = Some(references);
                rerender = session.has_answer();
            }
        }

        if let Some(fragment) = event.answer.filter(|a| !a.is_empty()) {
            if !self.first_token_seen {
                self.first_token_seen = true;
                if self.diagnostics {
                    let latency = self.elapsed().unwrap_or_default();
                    session.debug_log.append(
                        kind::TIMING,
                        format!("First token after {} ms", latency.as_millis()),
                        Some(json!({ "first_token_ms": latency.as_millis() as u64 })),
                    );
                }
                sink.first_token();
            }
            session.answer.push_str(&fragment);
            rerender = true;
        }

        if rerender {
            let rendered = link_citations(&session.answer, session.references());
            sink.answer_updated(&rendered);
        }
    }

    /// Body ended without a sentinel.
    pub fn end_of_body(&mut self, session: &mut SessionState) {
        if self.phase == StreamPhase::Streaming {
            self.phase = StreamPhase::Completed;
            session.debug_log.append(
                kind::STREAM,
                "Stream ended without a completion marker",
                None,
            );
        }
    }

    /// Success path. Returns the elapsed time unless it was already reported.
    pub fn complete(&mut self, session: &mut SessionState) -> Option<Duration> {
        if self.phase == StreamPhase::Streaming {
            self.phase = StreamPhase::Completed;
        }
        let elapsed = self.take_elapsed()?;
        if self.diagnostics {
            session.debug_log.append(
                kind::TIMING,
                format!("Answer completed in {} ms", elapsed.as_millis()),
                Some(json!({
                    "total_ms": elapsed.as_millis() as u64,
                    "answer_chars": session.answer.chars().count(),
                })),
            );
        }
        Some(elapsed)
    }

    pub fn fail(&mut self, session: &mut SessionState, error: &str) {
        self.phase = StreamPhase::Failed;
        session.debug_log.append(kind::ERROR, format!("Search failed: {}", error), None);
    }

    /// Elapsed time since dispatch, handed out at most once per search.
    pub fn take_elapsed(&mut self) -> Option<Duration> {
        if self.elapsed_reported {
            return None;
        }
        let elapsed = self.elapsed()?;
        self.elapsed_reported = true;
        Some(elapsed)
    }

    fn elapsed(&self) -> Option<Duration> {
        self.dispatched_at.map(|started| started.elapsed())
    }
}

/// Feed every line of `lines` to the reducer until the sentinel or end of body.
/// Lines after the sentinel are never pulled from the stream.
pub async fn drain_lines<L, E>(
    mut lines: L,
    reducer: &mut StreamReducer,
    session: &mut SessionState,
    sink: &mut dyn StreamSink,
) -> Result<StreamEnd, E>
where
    L: Stream<Item = Result<String, E>> + Unpin,
{
    while let Some(line) = lines.next().await {
        if reducer.apply_line(&line?, session, sink) == LineOutcome::Finished {
            return Ok(StreamEnd::Sentinel);
        }
    }
    reducer.end_of_body(session);
    Ok(StreamEnd::EndOfBody)
}

fn strip_data_prefix(line: &str) -> &str {
    line.strip_prefix(DATA_PREFIX).map(str::trim_start).unwrap_or(line)
}

fn is_sentinel(text: &str) -> bool {
    text.eq_ignore_ascii_case(DONE_SENTINEL)
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}
