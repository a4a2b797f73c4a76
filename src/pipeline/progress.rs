//! Staged progress reporting for long-running requests.
//!
//! Pipeline execution is modeled as an ordered state sequence; each
//! transition emits one event. States only move forward (a cache hit skips
//! straight to done), and `done`/`error` are terminal. Streaming callers
//! consume the events over a channel; the non-streaming path drops them.

use crate::graph::ConceptGraph;
use serde::Serialize;
use uuid::Uuid;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    CacheCheck,
    FetchText,
    Title,
    Segment,
    SummarizeExtract,
    CacheStore,
    Done,
    Error,
}

impl Stage {
    /// Human-readable stage label carried on every event.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CacheCheck => "checking cache",
            Self::FetchText => "fetching text",
            Self::Title => "generating title",
            Self::Segment => "segmenting text",
            Self::SummarizeExtract => "summarizing and extracting concepts",
            Self::CacheStore => "storing result",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    fn order(&self) -> u8 {
        match self {
            Self::CacheCheck => 0,
            Self::FetchText => 1,
            Self::Title => 2,
            Self::Segment => 3,
            Self::SummarizeExtract => 4,
            Self::CacheStore => 5,
            Self::Done => 6,
            Self::Error => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Final payload carried by a terminal event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ProgressPayload {
    Finished { graph: ConceptGraph, title: String },
    Failed { message: String },
}

/// One stage-completion event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// The request this event belongs to
    pub request_id: Uuid,
    pub stage: Stage,
    pub label: &'static str,
    /// Present only at `done` / `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ProgressPayload>,
}

/// Attempted transition that the state machine forbids.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("stage {from:?} cannot transition to {to:?}")]
    Backward { from: Stage, to: Stage },

    #[error("no transitions allowed out of terminal stage {0:?}")]
    Terminal(Stage),
}

/// Enforces the forward-only stage sequence for one request.
#[derive(Debug)]
pub struct StageTracker {
    request_id: Uuid,
    current: Option<Stage>,
}

impl StageTracker {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            current: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Move to a non-terminal stage, emitting its event.
    pub fn advance(&mut self, stage: Stage) -> Result<ProgressEvent, ProgressError> {
        debug_assert!(!stage.is_terminal(), "terminal stages use finish/fail");
        self.transition(stage, None)
    }

    /// Terminate successfully with the final graph and title.
    pub fn finish(
        &mut self,
        graph: ConceptGraph,
        title: String,
    ) -> Result<ProgressEvent, ProgressError> {
        self.transition(Stage::Done, Some(ProgressPayload::Finished { graph, title }))
    }

    /// Terminate with an error description.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<ProgressEvent, ProgressError> {
        self.transition(
            Stage::Error,
            Some(ProgressPayload::Failed {
                message: message.into(),
            }),
        )
    }

    fn transition(
        &mut self,
        to: Stage,
        payload: Option<ProgressPayload>,
    ) -> Result<ProgressEvent, ProgressError> {
        if let Some(from) = self.current {
            if from.is_terminal() {
                return Err(ProgressError::Terminal(from));
            }
            // `error` is reachable from any live state; everything else
            // must move strictly forward, which also rules out revisits.
            if to != Stage::Error && to.order() <= from.order() {
                return Err(ProgressError::Backward { from, to });
            }
        }

        self.current = Some(to);
        Ok(ProgressEvent {
            request_id: self.request_id,
            stage: to,
            label: to.label(),
            payload,
        })
    }
}
