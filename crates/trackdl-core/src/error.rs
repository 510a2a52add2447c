//! Per-track error taxonomy.
//!
//! Every failure of a single track ends up as a `TrackError` at the task
//! boundary; the orchestrator records it and moves on.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// The descriptor has no presence on the current page.
    #[error("track {catalog_id} not found on the page")]
    NotFound { catalog_id: String },

    /// Every resolution strategy was tried and none produced a URL.
    #[error("could not resolve a stream for {catalog_id}: {reason}")]
    ResolutionFailed { catalog_id: String, reason: String },

    /// A bounded operation exceeded its limit.
    #[error("{what} timed out after {}s", .limit.as_secs())]
    Timeout { what: &'static str, limit: Duration },

    /// Transport or tool failure while materializing the stream.
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
}

impl TrackError {
    pub fn fetch(msg: impl std::fmt::Display) -> Self {
        TrackError::Fetch(anyhow::anyhow!("{}", msg))
    }

    /// Short label for status lines and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TrackError::NotFound { .. } => "not found",
            TrackError::ResolutionFailed { .. } => "resolution failed",
            TrackError::Timeout { .. } => "timeout",
            TrackError::Fetch(_) => "fetch error",
        }
    }
}

impl From<anyhow::Error> for TrackError {
    fn from(e: anyhow::Error) -> Self {
        TrackError::Fetch(e)
    }
}

/// Failure of an external tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program} is not installed or not on PATH")]
    Unavailable { program: String },

    #[error("{program} timed out after {}s", .limit.as_secs())]
    Timeout { program: String, limit: Duration },

    /// `code` is None when the process was killed by a signal.
    #[error("{program} exited with {}", exit_label(.code))]
    Failed { program: String, code: Option<i32> },

    /// Exit status was zero but the expected file is not there.
    #[error("{program} did not produce {}", .path.display())]
    MissingOutput { program: String, path: std::path::PathBuf },

    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "a signal".to_string(),
    }
}
