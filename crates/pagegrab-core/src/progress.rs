//! Progress reporting for a single transfer.
//!
//! libcurl reports `(dltotal, dlnow, ultotal, ulnow)` from inside `perform`;
//! `PercentTracker` turns that into a bounded, non-decreasing percentage and
//! forwards changes to a `ProgressSink` (a terminal bar in the CLI).

/// Receiver of percentage updates. Called on the transfer's I/O path, so
/// implementations must return quickly.
pub trait ProgressSink {
    fn start(&mut self) {}
    fn update(&mut self, percent: u8);
    fn finish(&mut self) {}
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _percent: u8) {}
}

/// Per-transfer percentage state. A new tracker is built for every session.
#[derive(Debug, Default, Clone)]
pub struct PercentTracker {
    current: Option<u8>,
}

impl PercentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last percentage forwarded, if any.
    pub fn current(&self) -> Option<u8> {
        self.current
    }

    /// Feeds one libcurl progress tick. Returns the percentage to display when
    /// it moved forward; `None` when the total is unknown or nothing changed.
    pub fn observe(&mut self, dltotal: f64, dlnow: f64) -> Option<u8> {
        let percent = percent_of(dltotal, dlnow)?;
        match self.current {
            Some(prev) if percent <= prev => None,
            _ => {
                self.current = Some(percent);
                Some(percent)
            }
        }
    }

    /// `observe`, then forward to `sink` when there is something new.
    pub fn forward(&mut self, dltotal: f64, dlnow: f64, sink: &mut dyn ProgressSink) {
        if let Some(p) = self.observe(dltotal, dlnow) {
            sink.update(p);
        }
    }
}

/// floor(now / total * 100) clamped to 0..=100; `None` for an unknown total.
pub fn percent_of(total: f64, now: f64) -> Option<u8> {
    if !(total > 0.0) || !now.is_finite() {
        return None;
    }
    let pct = (now / total * 100.0).floor();
    Some(pct.clamp(0.0, 100.0) as u8)
}
