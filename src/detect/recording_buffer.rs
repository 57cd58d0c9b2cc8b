//! Recording buffer (spec.md §4.8, C8): a ring over the rec-stream that
//! slices a bounded audio excerpt anchored on each confirmed sequence.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::core::Timestamp;
use crate::types::{RecordingExcerpt, Sequence};

#[derive(Debug, Clone)]
pub struct RecordingBufferParams {
    pub record_time_lower: Duration,
    pub record_time_upper: Duration,
    pub storing_fs: f64,
    pub record_time_buffer: Duration,
}

struct RingSample {
    t: Timestamp,
    value: f32,
}

/// C8. The ring is guarded by a single mutex owned by the caller (the
/// supervisor); this type itself is `!Sync`-free plain state, matching
/// spec.md §5's "only read by C8's worker" note.
pub struct RecordingBuffer {
    params: RecordingBufferParams,
    rec_fs: f64,
    ring: VecDeque<RingSample>,
    max_samples: usize,
}

impl RecordingBuffer {
    pub fn new(params: RecordingBufferParams, rec_fs: f64) -> Self {
        let span = params.record_time_buffer + params.record_time_upper;
        let max_samples = (span.as_secs_f64() * rec_fs).ceil() as usize + 1;
        Self { params, rec_fs, ring: VecDeque::with_capacity(max_samples), max_samples }
    }

    pub fn push(&mut self, t: &[Timestamp], samples: &[f32]) {
        for (&t, &value) in t.iter().zip(samples.iter()) {
            self.ring.push_back(RingSample { t, value });
        }
        while self.ring.len() > self.max_samples {
            self.ring.pop_front();
        }
    }

    /// Slice `[anchor - record_time_lower, anchor - record_time_lower +
    /// record_time_upper]` for a confirmed sequence. If the ring lacks
    /// enough post-anchor audio yet, the caller should retry (bounded by
    /// `record_time_upper - record_time_lower`); `excerpt_for` itself
    /// does not block.
    pub fn excerpt_for(&self, sequence: &Sequence) -> RecordingExcerpt {
        let anchor = sequence.t_calc_start;
        let lower = anchor
            .checked_sub(self.params.record_time_lower)
            .unwrap_or(anchor);
        let upper = lower + self.params.record_time_upper;

        let samples: Vec<f32> = self
            .ring
            .iter()
            .filter(|s| s.t.calc >= lower && s.t.calc <= upper)
            .map(|s| s.value)
            .collect();

        let expected = (self.params.record_time_upper.as_secs_f64() * self.rec_fs).round() as usize;
        let truncated = samples.len() + 1 < expected;

        RecordingExcerpt { samples, fs: self.rec_fs, truncated }
    }

    /// Whether enough post-anchor audio has accumulated to slice
    /// without truncation, used by the supervisor's bounded wait.
    pub fn ready_for(&self, sequence: &Sequence) -> bool {
        let anchor = sequence.t_calc_start;
        let upper = anchor
            .checked_sub(self.params.record_time_lower)
            .unwrap_or(anchor)
            + self.params.record_time_upper;
        self.ring.back().map(|s| s.t.calc >= upper).unwrap_or(false)
    }

    pub fn max_wait(&self) -> Duration {
        self.params
            .record_time_upper
            .saturating_sub(self.params.record_time_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToneRecord;

    fn params() -> RecordingBufferParams {
        RecordingBufferParams {
            record_time_lower: Duration::from_secs(2),
            record_time_upper: Duration::from_secs(10),
            storing_fs: 8000.0,
            record_time_buffer: Duration::from_secs(5),
        }
    }

    fn sequence_at(t_calc: Instant) -> Sequence {
        Sequence {
            t_ref_start: 0,
            t_calc_start: t_calc,
            tones: vec![ToneRecord {
                t: Timestamp::new(t_calc, 0),
                tone_index: 1,
                length: Duration::from_millis(70),
                period: Duration::from_millis(70),
                frequency: 1060.0,
                abs_level: 1.0,
            }],
        }
    }

    #[test]
    fn truncates_when_ring_is_short() {
        let start = Instant::now();
        let mut buf = RecordingBuffer::new(params(), 8000.0);
        let t: Vec<Timestamp> = (0..100).map(|i| Timestamp::new(start + Duration::from_millis(i), 0)).collect();
        let samples = vec![0.0_f32; 100];
        buf.push(&t, &samples);

        let seq = sequence_at(start + Duration::from_millis(50));
        let excerpt = buf.excerpt_for(&seq);
        assert!(excerpt.truncated);
    }
}
