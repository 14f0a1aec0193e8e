//! Fire-and-forget progress reporting.
//!
//! Percentages reach the sink clamped to `0..=100` and never decreasing. A failing or
//! panicking sink is ignored: progress can never fail a job.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event.percent, &event.message)
    }
}

impl ProgressSink for Sender<ProgressEvent> {
    fn report(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

/// Per-job reporter wrapping an optional sink.
pub struct Progress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    last: AtomicU8,
}

impl<'a> Progress<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn report(&self, percent: i32, message: impl Into<String>) {
        let clamped = percent.clamp(0, 100) as u8;
        let percent = self.last.fetch_max(clamped, Ordering::SeqCst).max(clamped);
        let Some(sink) = self.sink else {
            return;
        };
        let event = ProgressEvent {
            percent,
            message: message.into(),
        };
        if catch_unwind(AssertUnwindSafe(|| sink.report(&event))).is_err() {
            log::warn!("[progress] sink panicked at {percent}%; ignoring");
        }
    }

    /// Highest percentage reported so far.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;

    #[test]
    fn percentages_are_clamped_and_monotonic() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8, _m: &str| seen.lock().unwrap().push(p);
        let progress = Progress::new(Some(&sink));
        progress.report(-5, "a");
        progress.report(40, "b");
        progress.report(25, "c");
        progress.report(180, "d");
        assert_eq!(*seen.lock().unwrap(), vec![0, 40, 40, 100]);
    }

    #[test]
    fn panicking_sink_is_swallowed() {
        let sink = |_p: u8, _m: &str| panic!("sink broke");
        let progress = Progress::new(Some(&sink));
        progress.report(10, "x");
        assert_eq!(progress.last(), 10);
    }

    #[test]
    fn channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let progress = Progress::new(Some(&tx));
        progress.report(50, "nobody listening");
    }
}
