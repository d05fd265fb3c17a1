//! Leading-edge throttle for widget progress samples.

use std::time::Duration;
use tokio::time::Instant;

/// One `play_progress` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProgressSample {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

/// Commits at most one sample per interval. The first sample of a burst is
/// committed immediately; later ones inside the window replace each other and
/// the newest can be recovered with [`flush`](Self::flush).
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last_commit: Option<Instant>,
    pending: Option<ProgressSample>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_commit: None,
            pending: None,
        }
    }

    /// Returns the sample to commit now, if any.
    pub fn offer(&mut self, sample: ProgressSample, now: Instant) -> Option<ProgressSample> {
        match self.last_commit {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.pending = Some(sample);
                None
            }
            _ => {
                self.last_commit = Some(now);
                self.pending = None;
                Some(sample)
            }
        }
    }

    /// Newest sample skipped since the last commit.
    pub fn flush(&mut self) -> Option<ProgressSample> {
        self.pending.take()
    }

    pub fn reset(&mut self) {
        self.last_commit = None;
        self.pending = None;
    }
}
