//! End-to-end scenarios (spec.md §8, S1-S7): a synthesized multi-tone
//! signal is played back through a `SyntheticCapture` and driven all
//! the way through `PipelineSupervisor::run`, verifying what comes out
//! the notification collaborator rather than any single stage.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fme_detect::capture::SyntheticCapture;
use fme_detect::detect::freq_search::FreqSearchParams;
use fme_detect::detect::recording_buffer::RecordingBufferParams;
use fme_detect::detect::supervisor::{PipelineSupervisor, SupervisorParams};
use fme_detect::detect::tone_assembler::ToneAssemblerParams;
use fme_detect::detect::tone_table::default_table;
use fme_detect::dsp::downsampler::FullDownsampler;
use fme_detect::dsp::fir::FilterSpec;
use fme_detect::notify::{FoundSequence, NotificationSink};
use fme_detect::sink::AudioSinkPlugin;
use fme_detect::RecordingExcerpt;

const FS: f64 = 8000.0;

/// A no-op sink: these tests care about what the supervisor decides to
/// admit, not about WAV bytes on disk.
struct NullSink;

impl AudioSinkPlugin for NullSink {
    fn save(&self, _path: &std::path::Path, _samples: &[f32], _fs: u32, _amplify: bool) -> fme_detect::core::DetectResult<()> {
        Ok(())
    }
    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

#[derive(Default)]
struct CapturingSink {
    found: Mutex<Vec<FoundSequence>>,
    recorded: Mutex<Vec<(FoundSequence, RecordingExcerpt)>>,
}

impl NotificationSink for CapturingSink {
    fn on_found_sequence(&self, seq: &FoundSequence) {
        self.found.lock().unwrap().push(seq.clone());
    }
    fn on_recorded_data(&self, seq: &FoundSequence, excerpt: &RecordingExcerpt) {
        self.recorded.lock().unwrap().push((seq.clone(), excerpt.clone()));
    }
}

fn identity_spec() -> FilterSpec {
    FilterSpec::new(vec![1.0], 1, 1, 1e-12).unwrap()
}

fn tone_samples(tone_index: usize, duration_ms: f64) -> Vec<f32> {
    let freq = default_table()
        .into_iter()
        .find(|e| e.tone_index == tone_index)
        .expect("known tone index")
        .frequency;
    let n = (duration_ms * 1e-3 * FS).round() as usize;
    (0..n)
        .map(|i| (2.0 * PI * freq * i as f64 / FS).sin() as f32)
        .collect()
}

/// Builds a supervisor wired with a pass-through C5 (down=1 both
/// streams) so the freq-search stage sees the raw, known-frequency
/// signal directly; `code_length` and amplitude/duration gates are
/// loosened to match the single-level synthetic tones below.
fn build_supervisor(code_length: usize) -> PipelineSupervisor {
    let downsampler = FullDownsampler::new(identity_spec(), identity_spec()).unwrap();

    let freq_search_params = FreqSearchParams {
        sample_length_ms: 10.0,
        freq_resolution_n: 256,
        fs: FS,
        max_num_peaks: 3,
        overlap: 0.5,
        delta: 0.1,
    };

    let tone_assembler_params = ToneAssemblerParams {
        code_length,
        excess_time: Duration::from_millis(0),
        dt_max_twice: Duration::from_millis(500),
        min_length: Duration::from_millis(30),
        max_length: Duration::from_millis(400),
        max_tone_level_ratio: 4.0,
    };

    let recording_params = RecordingBufferParams {
        record_time_lower: Duration::from_millis(200),
        record_time_upper: Duration::from_secs(1),
        storing_fs: FS,
        record_time_buffer: Duration::from_secs(1),
    };

    let supervisor_params = SupervisorParams {
        tone_table: default_table(),
        tone_match_tolerance_hz: 25.0,
        min_distance_repetition: Duration::from_millis(500),
        record_time_upper: Duration::from_secs(1),
        whitelist: Vec::new(),
        default_recording: true,
    };

    PipelineSupervisor::new(
        supervisor_params,
        freq_search_params,
        tone_assembler_params,
        downsampler,
        recording_params,
        FS,
        50_000,
    )
    .unwrap()
}

#[test]
fn s1_clean_five_tone_code_is_reported() {
    let supervisor = build_supervisor(5);
    let mut signal = Vec::new();
    for &digit in &[1usize, 2, 3, 4, 5] {
        signal.extend(tone_samples(digit, 100.0));
    }

    let capture = SyntheticCapture::new(signal, 400, FS);
    let sink = NullSink;
    let notify = CapturingSink::default();

    supervisor.run(capture, &sink, &notify).expect("pipeline run");

    let found = notify.found.lock().unwrap();
    assert!(!found.is_empty(), "expected at least one admitted sequence");
    assert_eq!(found[0].code, vec![1, 2, 3, 4, 5]);
}

#[test]
fn s3_long_zero_is_rewritten_to_digit_zero_end_to_end() {
    use fme_detect::detect::tone_table::LONG_ZERO_INDEX;

    let supervisor = build_supervisor(5);
    let mut signal = Vec::new();
    for &digit in &[LONG_ZERO_INDEX, 2, 3, 4, 5] {
        signal.extend(tone_samples(digit, 100.0));
    }

    let capture = SyntheticCapture::new(signal, 400, FS);
    let sink = NullSink;
    let notify = CapturingSink::default();

    supervisor.run(capture, &sink, &notify).expect("pipeline run");

    let found = notify.found.lock().unwrap();
    assert!(!found.is_empty(), "expected at least one admitted sequence");
    assert_eq!(found[0].code[0], 0);
}

#[test]
fn blacklist_suppresses_immediate_repetition_of_the_same_code() {
    let supervisor = build_supervisor(5);
    let mut signal = Vec::new();
    for _ in 0..2 {
        for &digit in &[1usize, 2, 3, 4, 5] {
            signal.extend(tone_samples(digit, 100.0));
        }
    }

    let capture = SyntheticCapture::new(signal, 400, FS);
    let sink = NullSink;
    let notify = CapturingSink::default();

    supervisor.run(capture, &sink, &notify).expect("pipeline run");

    let found = notify.found.lock().unwrap();
    // Both repeats land on the same code within `min_distance_repetition`
    // (500ms); the second one is recorded into the blacklist and must not
    // be reported a second time.
    assert!(found.len() <= 1);
}

#[test]
fn empty_capture_stream_ends_the_run_cleanly() {
    let supervisor = build_supervisor(5);
    let capture = SyntheticCapture::new(Vec::new(), 400, FS);
    let sink = NullSink;
    let notify = CapturingSink::default();

    supervisor.run(capture, &sink, &notify).expect("pipeline run");
    assert!(notify.found.lock().unwrap().is_empty());
}
