//! Request stages and the progress-callback trait that observes them.
//!
//! Every request walks a small state machine:
//!
//! ```text
//! Idle ─▶ Classifying ─▶ Fetching ─▶ Extracting ─▶ Done
//!   │          │                          │
//!   │          └────────▶ Rendering ──────┤
//!   └─▶ Fetching (webpage)                └─▶ Failed
//! ```
//!
//! Classification runs before the fetch so an `unknown` reference fails
//! without any network I/O. There is no retry edge: `Done` and `Failed` are
//! terminal and each is entered at most once per request.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! every transition.
//!
//! # Example
//!
//! ```rust
//! use docpipe::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage(&self, reference: &str, stage: Stage) {
//!         eprintln!("{reference}: {stage}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::DocpipeError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A stage in the life of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Idle,
    Classifying,
    Fetching,
    Extracting,
    Rendering,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether `self → next` is an edge of the request state machine.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Classifying | Fetching | Rendering) => true,
            (Classifying, Fetching | Rendering) => true,
            (Fetching, Extracting) => true,
            (Extracting | Rendering, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Classifying => "classifying",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the orchestrator on every stage transition.
///
/// Implementations must be `Send + Sync`: [`crate::convert::extract_many`]
/// runs requests concurrently and all of them report to the same callback.
/// All methods have default no-op implementations.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when a request enters `stage`.
    fn on_stage(&self, reference: &str, stage: Stage) {
        let _ = (reference, stage);
    }

    /// Called once when a request enters `Failed`.
    ///
    /// # Arguments
    /// * `reference` — the source reference (URL or a short label for markup)
    /// * `error`     — human-readable error description
    fn on_failure(&self, reference: &str, error: &str) {
        let _ = (reference, error);
    }
}

/// Convenience alias for the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Tracks the stage of a single request and reports transitions.
pub(crate) struct StageTracker<'a> {
    reference: &'a str,
    stage: Stage,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> StageTracker<'a> {
    pub(crate) fn new(reference: &'a str, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            reference,
            stage: Stage::Idle,
            callback,
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`. An illegal edge is a bug in the orchestrator.
    pub(crate) fn advance(&mut self, next: Stage) -> Result<(), DocpipeError> {
        if !self.stage.can_advance_to(next) {
            return Err(DocpipeError::Internal(format!(
                "illegal stage transition {} → {} for '{}'",
                self.stage, next, self.reference
            )));
        }
        debug!("{}: {} → {}", self.reference, self.stage, next);
        self.stage = next;
        if let Some(cb) = self.callback {
            cb.on_stage(self.reference, next);
        }
        Ok(())
    }

    /// Enter `Done` with `value`, or `Failed` with the error.
    pub(crate) fn finish<T>(
        &mut self,
        result: Result<T, DocpipeError>,
    ) -> Result<T, DocpipeError> {
        match result {
            Ok(value) => {
                self.advance(Stage::Done)?;
                Ok(value)
            }
            Err(e) => {
                if !self.stage.is_terminal() {
                    self.stage = Stage::Failed;
                    debug!("{}: failed — {}", self.reference, e);
                    if let Some(cb) = self.callback {
                        cb.on_stage(self.reference, Stage::Failed);
                        cb.on_failure(self.reference, &e.to_string());
                    }
                }
                Err(e)
            }
        }
    }
}
