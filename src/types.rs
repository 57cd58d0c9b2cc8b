//! Shared data types threaded between pipeline stages (spec.md §3).

use crate::core::Timestamp;

/// One 32-bit audio sample plus its dual timestamp. Chunks of these are
/// what `AudioCapture` hands to the resampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f32,
    pub t: Timestamp,
}

/// An ordered, FIFO run of samples produced by one capture callback.
/// Sizes vary per callback; the type is just a thin alias so call sites
/// read naturally.
pub type Chunk = Vec<Sample>;

/// Per-frame tone-candidate output of the STFT + peak-finder (C6).
/// `peaks[i]` (Hz) and `levels[i]` (raw PSD amplitude) are parallel; an
/// empty frame means "no tone candidate here", including the explicit
/// suppression when `max_num_peaks` is exceeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFrame {
    pub t_calc: Timestamp,
    /// Time span this page's window covers; lets the supervisor turn a
    /// run of consecutive same-tone frames into one event with a real
    /// duration instead of a zero-length instant.
    pub hop: std::time::Duration,
    pub peaks: Vec<f64>,
    pub levels: Vec<f64>,
}

impl PeakFrame {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// A single candidate tone, already matched against the tone-frequency
/// table by the supervisor before reaching the tone-assembler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    pub tone_index: usize,
    pub t: Timestamp,
    pub t_calc_end: std::time::Instant,
    pub frequency: f64,
    pub abs_level: f64,
}

/// Output of the tone-assembler's length/period check: one slot of a
/// candidate sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRecord {
    pub t: Timestamp,
    pub tone_index: usize,
    pub length: std::time::Duration,
    pub period: std::time::Duration,
    pub frequency: f64,
    pub abs_level: f64,
}

/// A confirmed five-tone (or `L`-tone) sequence, ready for the
/// supervisor to hand to notification collaborators and pair with a
/// recording excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub t_ref_start: u64,
    pub t_calc_start: std::time::Instant,
    pub tones: Vec<ToneRecord>,
}

impl Sequence {
    /// The digits as they will be reported downstream (post special-tone
    /// rewrite; see `detect::tone_assembler`).
    pub fn code(&self) -> Vec<usize> {
        self.tones.iter().map(|t| t.tone_index).collect()
    }
}

/// A contiguous slice of the rec-stream anchored on a confirmed
/// sequence, plus whether C8 had to truncate it for lack of buffered
/// audio.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingExcerpt {
    pub samples: Vec<f32>,
    pub fs: f64,
    pub truncated: bool,
}
