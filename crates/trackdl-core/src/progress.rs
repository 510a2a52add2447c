//! Progress reporting for track and batch runs.
//!
//! A single latest-value slot (a `tokio::sync::watch` channel): the resolver,
//! fetcher and orchestrator overwrite it, the display reads whatever is current
//! at its own cadence. Intermediate values may be skipped; only the most recent
//! state matters, so there is no backpressure.

use std::time::Duration;
use tokio::sync::watch;

/// Stage of a single track's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Downloading,
    Converting,
    Finalizing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Resolving => "resolving",
            Phase::Downloading => "downloading",
            Phase::Converting => "converting",
            Phase::Finalizing => "finalizing",
        }
    }
}

/// Progress of the track currently being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Clamped to [0, 100].
    pub percent: f64,
    pub speed_label: String,
    pub eta_label: String,
    pub phase: Phase,
}

impl ProgressEvent {
    pub fn new(phase: Phase, percent: f64) -> Self {
        Self {
            percent: clamp_percent(percent),
            speed_label: String::new(),
            eta_label: String::new(),
            phase,
        }
    }

    pub fn with_speed(mut self, speed: impl Into<String>) -> Self {
        self.speed_label = speed.into();
        self
    }

    pub fn with_eta(mut self, eta: impl Into<String>) -> Self {
        self.eta_label = eta.into();
        self
    }
}

/// Position of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// 0 for the initial pass, 1.. for retry passes.
    pub pass: u32,
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub eta_label: String,
}

/// Everything the display needs, in one slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub track: Option<ProgressEvent>,
    pub batch: Option<BatchProgress>,
    /// Human-readable status line (current item, final result, failure reason).
    pub status: Option<String>,
}

/// Writer side of the progress slot.
pub struct ProgressReporter {
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx }
    }

    /// Receiver for the display. Any number may be taken.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Current track progress. Overwrites the previous event.
    pub fn report(&self, event: ProgressEvent) {
        self.tx.send_modify(|s| s.track = Some(event));
    }

    pub fn report_batch(&self, batch: BatchProgress) {
        self.tx.send_modify(|s| s.batch = Some(batch));
    }

    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.tx.send_modify(|s| s.status = Some(status));
    }

    /// Drops the track slot (between tasks).
    pub fn clear_track(&self) {
        self.tx.send_modify(|s| s.track = None);
    }

    /// Resets everything. Called at the start and end of each run.
    pub fn clear(&self) {
        self.tx.send_replace(ProgressSnapshot::default());
    }

    /// Latest value, for callers without a receiver.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }
}

pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 100.0)
    }
}

/// "1.2 MB/s", "340 KB/s", "12 B/s".
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1024.0 * 1024.0 {
        format!("{:.1} MB/s", bytes_per_sec / (1024.0 * 1024.0))
    } else if bytes_per_sec >= 1024.0 {
        format!("{:.0} KB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.0} B/s", bytes_per_sec.max(0.0))
    }
}

/// MM:SS, or HH:MM:SS past an hour.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let s = secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, s)
    } else {
        format!("{:02}:{:02}", minutes, s)
    }
}

/// Batch ETA = elapsed / completed × remaining. None before the first completion.
pub fn batch_eta(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(completed) as f64;
    let per_task = elapsed.as_secs_f64() / completed as f64;
    Some(Duration::from_secs_f64(per_task * remaining))
}

/// Batch percent = completed / total.
pub fn batch_percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    clamp_percent(completed as f64 * 100.0 / total as f64)
}
