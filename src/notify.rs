//! Notification collaborators (spec.md §6): invoked by the supervisor,
//! never by the inner pipeline stages directly.

use crate::types::RecordingExcerpt;

#[derive(Debug, Clone)]
pub struct FoundSequence {
    pub t_ref_start: u64,
    pub code: Vec<usize>,
}

pub trait NotificationSink: Send + Sync {
    fn on_found_sequence(&self, seq: &FoundSequence);
    fn on_recorded_data(&self, seq: &FoundSequence, excerpt: &RecordingExcerpt);
}

/// A sink that only logs; used by the example binary and tests in
/// place of the out-of-scope email/HTTP-gateway/program-launcher
/// collaborators (spec.md §1 "out of scope").
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn on_found_sequence(&self, seq: &FoundSequence) {
        log::info!("sequence found: t_ref_start={} code={:?}", seq.t_ref_start, seq.code);
    }

    fn on_recorded_data(&self, seq: &FoundSequence, excerpt: &RecordingExcerpt) {
        log::info!(
            "recording ready: code={:?} samples={} truncated={}",
            seq.code,
            excerpt.samples.len(),
            excerpt.truncated
        );
    }
}
